use std::{env, error::Error};

use semantic::{EmbedPurpose, EmbeddingConfig, EmbeddingSelector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let text = env::args()
        .nth(1)
        .unwrap_or_else(|| "What notice must a landlord give before eviction?".into());

    let selector = EmbeddingSelector::from_config(&EmbeddingConfig::default())?;
    for d in selector.descriptors() {
        println!("model: {} ({:?}, {} dims)", d.name, d.role, d.dimension);
    }

    let out = selector.select_and_embed(&text, EmbedPurpose::Query).await?;
    println!("selected: {}", out.model_name);
    println!("degraded: {}", out.degraded);
    println!("first values: {:?}", &out.vector[..out.vector.len().min(8)]);
    Ok(())
}
