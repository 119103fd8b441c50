use anyhow::{Result, anyhow};
use catalog_audit::config::RunArgs;
use catalog_audit::models::{Brand, Sku};
use catalog_audit::processor::CategoryClassifier;

fn main() -> Result<()> {
    let args = RunArgs::from_env()?;
    if args.help || args.positional.is_empty() {
        println!(
            "{}\n\nArguments: SKU or SKU:NAME, one or more",
            RunArgs::usage("classify_sku", "Show which category and brand the rules assign.")
        );
        return Ok(());
    }

    let classifier = CategoryClassifier::new()?;

    println!("{:<16} {:<14} {:<12} {:<11} NAME", "SKU", "CATEGORY", "SOURCE", "BRAND");
    for raw in &args.positional {
        let (sku, name) = raw.split_once(':').unwrap_or((raw.as_str(), ""));
        let sku = Sku::parse(sku).map_err(|e| anyhow!("{}: {}", raw, e))?;
        let (category, source) = classifier.classify_with_source(sku.as_str(), name);
        let brand = Brand::for_product(&sku, name);
        println!(
            "{:<16} {:<14} {:<12} {:<11} {}",
            sku.as_str(),
            category.label(),
            format!("{:?}", source),
            brand.name(),
            name
        );
    }
    Ok(())
}
