fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // ESP-IDF environment (linker args, sdkconfig) is only needed for
    // device builds; host tests and fuzzing skip it entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
