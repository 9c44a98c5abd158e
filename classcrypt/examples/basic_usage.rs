//! Basic usage example for `classcrypt`.

use classcrypt::prelude::*;
use classcrypt_key_file::FileRootKeySource;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let key_dir = PathBuf::from("./example_keys");
    let source = if key_dir.exists() {
        FileRootKeySource::new(&key_dir)?
    } else {
        println!("Initializing key directory at {}", key_dir.display());
        FileRootKeySource::init(&key_dir)?
    };
    let source = Arc::new(source);

    let config = EngineConfig {
        guard: GuardConfig {
            classifications: vec![Classification::Credential],
            states: vec![SecurityState::Escalating],
        },
        ..EngineConfig::default()
    };
    let (engine, controller) = Engine::bootstrap(source.clone(), &config)?;

    println!("Key fingerprints (epoch {}):", engine.registry().epoch());
    for (classification, fingerprint) in engine.registry().fingerprints() {
        println!("  {classification:<12} {fingerprint}");
    }

    let email = engine.encrypt("alice@example.com", Classification::Personal)?;
    println!("\nPersonal:   {email}");
    let plain = engine.decrypt(&email, Classification::Personal, controller.state())?;
    println!("Decrypted:  {plain}");

    let label = engine.encrypt_labeled("free text", "no-such-label")?;
    println!("Unknown label falls back to baseline: {label}");

    let password = engine.encrypt("hunter2", Classification::Credential)?;
    controller.transition(SecurityState::Escalating)?;
    match engine.decrypt(&password, Classification::Credential, controller.state()) {
        Err(e) => println!("\nWhile escalating: {e}"),
        Ok(_) => println!("\nWhile escalating: unexpectedly decrypted"),
    }
    controller.transition(SecurityState::Normal)?;

    source.rotate_root_key()?;
    controller.transition(SecurityState::Rotating)?;
    controller.transition(SecurityState::Normal)?;
    println!("\nRotated to epoch {}", engine.registry().epoch());
    let fresh = engine.encrypt("alice@example.com", Classification::Personal)?;
    println!("Personal:   {fresh}");

    for record in controller.history() {
        println!("  {} -> {} (epoch {})", record.from, record.to, record.epoch);
    }

    Ok(())
}
