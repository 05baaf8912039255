fn main() {
    // No-op on host builds; forwards the ESP-IDF sysenv when present.
    embuild::espidf::sysenv::output();
}
