use dotenvy::dotenv_iter;
use embuild::espidf;
use std::path::PathBuf;
use std::{env, fs};

const CA_CERT_PATH_KEY: &str = "BACKEND_CA_CERT_PATH";
const CA_CERT_OUT_FILE: &str = "backend_ca.pem";

fn main() {
    let values = load_dotenv_variables();
    embed_ca_certificate(&values);

    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        espidf::sysenv::output();
    }
}

/// Bakes the `.env` values into the firmware image.
///
/// The device has no file system to read `.env` from at runtime, so every
/// key-value pair is emitted as `cargo:rustc-env=KEY=VALUE` and read back in
/// `config.rs` with `option_env!`.
///
/// # Security Note
/// This hard-codes the WiFi passphrase and the device secret into the
/// firmware. Anyone holding the binary can extract them.
fn load_dotenv_variables() -> Vec<(String, String)> {
    println!("cargo:rerun-if-changed=.env");

    let mut values = Vec::new();
    if let Ok(iter) = dotenv_iter() {
        for item in iter {
            let (key, value) = item.expect("Failed to read .env element");
            println!("cargo:rustc-env={}={}", key, value);
            values.push((key, value));
        }
    }
    values
}

/// Copies the backend CA certificate into `OUT_DIR` with a trailing NUL, the
/// form the ESP-IDF TLS layer expects for PEM input. Without a configured
/// path an empty file is written and the firmware falls back to the built-in
/// certificate bundle.
fn embed_ca_certificate(values: &[(String, String)]) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let out_file = out_dir.join(CA_CERT_OUT_FILE);

    let cert_path = values
        .iter()
        .find(|(key, _)| key == CA_CERT_PATH_KEY)
        .map(|(_, value)| value.clone())
        .or_else(|| env::var(CA_CERT_PATH_KEY).ok())
        .filter(|path| !path.is_empty());

    let contents = match cert_path {
        Some(path) => {
            println!("cargo:rerun-if-changed={}", path);
            let mut pem = fs::read(&path)
                .unwrap_or_else(|e| panic!("Failed to read CA certificate {}: {}", path, e));
            pem.push(0);
            pem
        }
        None => Vec::new(),
    };

    fs::write(&out_file, contents).expect("Failed to write CA certificate into OUT_DIR");
}
