fn main() {
    // ESP-IDF link arguments are only emitted for firmware builds; host
    // builds (tests, simulation) have nothing to configure.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
