use crate::cli::MappingShowArgs;

pub fn run(args: MappingShowArgs) -> anyhow::Result<()> {
    let config = crate::load_config(&args.config, args.mapping.as_deref())?;
    let gateway = config.metadata_gateway();
    let record = gateway.require_record(&args.class)?;

    let json = serde_json::to_string_pretty(record.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to serialize mapping of {}: {e}", args.class))?;
    println!("{json}");
    Ok(())
}
