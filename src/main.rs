use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use lpg::abstraction::{Abstractor, OpenAiCompatibleAbstractor, PassthroughAbstractor};
use lpg::audit::verify::verify_chain;
use lpg::audit::ChainWriter;
use lpg::cli::{Cli, Commands};
use lpg::config::{ProviderMode, StartupConfig};
use lpg::gateway::Gateway;
use lpg::risk::Scorer;
use lpg::route::RouteEngine;
use lpg::upstream::openai::OpenAiCompatibleConfig;
use lpg::upstream::{
    MimoUpstream, OpenAiCompatibleUpstream, StubUpstream, UpstreamAdapter, VllmUpstream,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve().await,
        Commands::VerifyAudit { path } => {
            verify_chain(&path).with_context(|| format!("audit chain at {}", path.display()))?;
            println!("audit chain OK: {}", path.display());
            Ok(())
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let cfg = StartupConfig::from_env().context("invalid startup configuration")?;

    let audit =
        Arc::new(ChainWriter::open(&cfg.audit_path).context("failed to initialize audit writer")?);
    let upstream = upstream_from_config(&cfg).context("failed to initialize upstream provider")?;
    let abstractor =
        abstractor_from_config(&cfg).context("failed to initialize local abstraction provider")?;

    let gateway = Gateway::new()
        .with_scorer(Scorer::default())
        .with_router(RouteEngine::new(
            cfg.allow_raw_forwarding,
            cfg.critical_local_only,
        ))
        .with_upstream(upstream)
        .with_abstractor(abstractor)
        .with_audit(audit)
        .with_provider_timeout(cfg.provider_timeout)
        .with_strict_audit(cfg.strict_audit);

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;

    tracing::info!(
        listen = %cfg.listen_addr,
        provider = cfg.provider.as_str(),
        raw_forward = cfg.allow_raw_forwarding,
        critical_local_only = cfg.critical_local_only,
        local_abstractor = !cfg.local_abstraction.base_url.is_empty(),
        "lpg gateway starting"
    );

    axum::serve(listener, gateway.into_router())
        .await
        .context("server failed")?;
    Ok(())
}

fn upstream_from_config(cfg: &StartupConfig) -> anyhow::Result<Arc<dyn UpstreamAdapter>> {
    let adapter: Arc<dyn UpstreamAdapter> = match cfg.provider {
        ProviderMode::Stub => Arc::new(StubUpstream),
        ProviderMode::VllmLocal => Arc::new(VllmUpstream::new(&cfg.vllm_base_url, &cfg.vllm_model)?),
        ProviderMode::MimoOnline => Arc::new(MimoUpstream::new(
            &cfg.mimo_base_url,
            &cfg.mimo_api_key,
            &cfg.mimo_model,
        )?),
        ProviderMode::OpenAiCompatible => {
            Arc::new(OpenAiCompatibleUpstream::new(OpenAiCompatibleConfig {
                base_url: cfg.upstream.base_url.clone(),
                api_key: cfg.upstream.api_key.clone(),
                model: cfg.upstream.model.clone(),
                api_key_header: cfg.upstream.api_key_header.clone(),
                api_key_prefix: cfg.upstream.api_key_prefix.clone(),
                chat_path: cfg.upstream.chat_path.clone(),
            })?)
        }
    };
    Ok(adapter)
}

fn abstractor_from_config(cfg: &StartupConfig) -> anyhow::Result<Arc<dyn Abstractor>> {
    if cfg.local_abstraction.base_url.is_empty() {
        return Ok(Arc::new(PassthroughAbstractor));
    }

    let abstractor = OpenAiCompatibleAbstractor::new(OpenAiCompatibleConfig {
        base_url: cfg.local_abstraction.base_url.clone(),
        api_key: cfg.local_abstraction.api_key.clone(),
        model: cfg.local_abstraction.model.clone(),
        api_key_header: cfg.local_abstraction.api_key_header.clone(),
        api_key_prefix: cfg.local_abstraction.api_key_prefix.clone(),
        chat_path: cfg.local_abstraction.chat_path.clone(),
    })?;
    Ok(Arc::new(abstractor))
}
