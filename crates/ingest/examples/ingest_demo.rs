use std::error::Error;
use std::sync::Arc;

use ingest::{DocumentStore, IngestConfig, Ingestor, RawDocument};
use semantic::{EmbeddingConfig, EmbeddingSelector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let selector = Arc::new(EmbeddingSelector::from_config(&EmbeddingConfig::default())?);
    let store = Arc::new(DocumentStore::new());
    let ingestor = Ingestor::new(selector, Arc::clone(&store), IngestConfig::default());

    let summary = ingestor
        .ingest(vec![
            RawDocument::new("A landlord must give thirty days written notice.")
                .with_jurisdiction("CA")
                .with_domain("housing"),
            RawDocument::new(""),
            RawDocument::new("Overtime is paid at one and a half times the regular rate.")
                .with_domain("labor"),
        ])
        .await?;

    println!(
        "batch {}: accepted {}, rejected {}",
        summary.batch_id, summary.accepted, summary.rejected
    );
    for failure in &summary.errors {
        println!("  document {} rejected: {}", failure.position, failure.error);
    }
    for record in store.all() {
        let model = record.embedding.as_ref().map_or("none", |e| e.model_name.as_str());
        println!("{} [{} / {}] via {}: {}", record.id, record.jurisdiction, record.domain, model, record.excerpt(40));
    }
    Ok(())
}
