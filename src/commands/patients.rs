//! Patient registry: add and list patients.

use crate::records::storage::RecordStore;
use anyhow::anyhow;
use cliclack::{input, intro, outro};
use console::style;

/// Lists all registered patients.
pub fn handle_patients_list() -> Result<(), anyhow::Error> {
    let mut store = RecordStore::new(&super::record::data_dir()?)?;
    let patients = store.get_all_patients()?;

    if patients.is_empty() {
        println!("No patients registered. Add one with 'auscult patients add'.");
        return Ok(());
    }

    println!();
    println!("Registered patients:");
    println!();
    for patient in patients {
        println!("  ID: {}", patient.id);
        println!("    Name: {} ({})", patient.name, patient.age);
        if let Some(address) = &patient.address {
            println!("    Address: {address}");
        }
        if let Some(observations) = &patient.observations {
            println!("    Notes: {observations}");
        }
        println!();
    }

    Ok(())
}

/// Interactively registers a new patient.
pub async fn handle_patients_add() -> Result<(), anyhow::Error> {
    tracing::info!("=== auscult patient registration ===");

    ctrlc::set_handler(move || {}).ok();

    intro(style(" add patient ").on_white().black())?;

    let name: String = input("Name:")
        .validate(|value: &String| {
            if value.trim().is_empty() {
                Err("name is required")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;

    let age: String = input("Age:")
        .validate(|value: &String| match value.trim().parse::<i64>() {
            Ok(age) if (0..=150).contains(&age) => Ok(()),
            _ => Err("enter an age between 0 and 150"),
        })
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;
    let age: i64 = age
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid age: {e}"))?;

    let marital_status: String = input("Marital status:")
        .required(false)
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;

    let address: String = input("Address:")
        .required(false)
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;

    let observations: String = input("Observations:")
        .required(false)
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;

    let optional = |s: String| if s.trim().is_empty() { None } else { Some(s) };

    let mut store = RecordStore::new(&super::record::data_dir()?)?;
    let id = store.create_patient(
        name.trim(),
        age,
        optional(marital_status).as_deref(),
        optional(address).as_deref(),
        optional(observations).as_deref(),
    )?;

    outro(format!("Patient #{id} registered."))?;
    tracing::info!("Patient registered: id={id}");
    Ok(())
}
