//! immopredict - Main Entry Point

use clap::Parser;
use immopredict::cli::{
    cmd_clean, cmd_evaluate, cmd_fit, cmd_inspect, cmd_predict, cmd_serve, designated_groups, Cli, Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "immopredict=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { data, json } => {
            cmd_inspect(&data, json)?;
        }
        Commands::Clean { data, output, impute, fill, keep_text } => {
            cmd_clean(&data, &output, impute, &fill, keep_text)?;
        }
        Commands::Fit {
            data_dir,
            output,
            target,
            features,
            numeric,
            categorical,
            binary,
            transform,
            no_scale,
            export,
            baseline,
        } => {
            cmd_fit(
                &data_dir,
                &output,
                target.as_deref(),
                features,
                designated_groups(numeric, categorical, binary),
                transform,
                no_scale,
                export.as_deref(),
                baseline,
            )?;
        }
        Commands::Evaluate { models, data_dir, target } => {
            cmd_evaluate(&models, &data_dir, target.as_deref())?;
        }
        Commands::Predict { models, record, data, output } => {
            cmd_predict(&models, record.as_deref(), data.as_deref(), output.as_deref())?;
        }
        Commands::Serve { port, host, models } => {
            cmd_serve(host, port, models).await?;
        }
    }

    Ok(())
}
