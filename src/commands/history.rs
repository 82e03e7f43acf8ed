//! Metering history browser.
//!
//! Lists a patient's saved meterings in an interactive viewer; selecting
//! one opens it for review.

use crate::records::storage::RecordStore;
use crate::records::MeteringBrowser;
use anyhow::anyhow;
use cliclack::select;

/// Browses the saved meterings of a patient.
///
/// With no `patient` argument the patient is chosen interactively.
/// Selecting a metering hands it to the review workflow.
pub async fn handle_history(patient: Option<i64>) -> Result<(), anyhow::Error> {
    let mut store = RecordStore::new(&super::record::data_dir()?)?;

    let patient = match patient {
        Some(id) => store
            .get_patient(id)?
            .ok_or_else(|| anyhow!("no patient with id {id}"))?,
        None => {
            let patients = store.get_all_patients()?;
            if patients.is_empty() {
                println!("No patients registered. Add one with 'auscult patients add'.");
                return Ok(());
            }
            let mut prompt = select("Select patient:");
            for candidate in &patients {
                prompt = prompt.item(
                    candidate.id,
                    format!("{} ({})", candidate.name, candidate.age),
                    "",
                );
            }
            let id = prompt
                .interact()
                .map_err(|e| anyhow!("Selection cancelled: {e}"))?;
            patients
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| anyhow!("no patient with id {id}"))?
        }
    };

    let meterings = store.get_meterings_by_patient(patient.id)?;
    if meterings.is_empty() {
        println!("No meterings recorded for {} yet.", patient.name);
        return Ok(());
    }

    tracing::info!(
        "Browsing {} meterings for patient {}",
        meterings.len(),
        patient.id
    );

    let mut browser = MeteringBrowser::new(patient.name.clone(), meterings)?;
    let selected = browser.run()?;
    drop(browser);

    if let Some(metering_id) = selected {
        super::review::handle_review(metering_id).await?;
    }

    Ok(())
}
