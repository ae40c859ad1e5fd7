fn main() {
    println!("cargo:rerun-if-env-changed=OTAM_API_KEY");
    println!("cargo:rerun-if-env-changed=OTAM_URL");
    println!("cargo:rerun-if-env-changed=OTAM_DEVICE_ID");
    println!("cargo:rerun-if-env-changed=OTAM_DEVICE_PROFILE_ID");
    println!("cargo:rerun-if-env-changed=OTAM_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=OTAM_WIFI_PASS");

    // Only the firmware build needs the ESP-IDF environment; host tests
    // compile without it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
