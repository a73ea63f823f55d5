use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Report,
    Result,
    WrapErr,
    bail,
    eyre,
};
use deployments::{
    Chain,
    DeploymentRecord,
    DeploymentStore,
};
use epic_box::{
    AmbiguityPolicy,
    BackendSyncClient,
    CancelToken,
    EntityKind,
    IndexerClient,
    PollRequest,
    PollerConfig,
    RetryStrategy,
    ServiceEndpoints,
    cancellation,
    minting::MintPlan,
    packs::{
        Holding,
        collect_rewards,
        plan_pack_contents,
    },
    poll_entity,
    reveal,
    rewards::{
        RewardContracts,
        decode_rewards,
        marketplace_link,
        pack_address,
        parse_receipt_logs,
        redeemer_address,
    },
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};
use url::Url;

#[derive(Parser, Debug)]
#[command(version, about = "Epic Box redemption toolkit", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "false", global = true)]
    tracing: bool,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait until one minted player or scout is indexed, then sync it.
    Poll {
        #[arg(long)]
        chain: Chain,
        #[arg(long)]
        kind: EntityKind,
        #[arg(long)]
        id: u64,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Decode a redemption receipt and wait for all of its rewards.
    Reveal {
        #[arg(long)]
        chain: Chain,
        /// Receipt JSON, or just its `logs` array.
        #[arg(long)]
        receipt: PathBuf,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Plan how held reward NFTs are bundled into packs.
    PlanPacks {
        /// Chain whose pack contract receives the rewards.
        #[arg(long, default_value = "polygon")]
        chain: Chain,
        #[arg(long)]
        rewards: PathBuf,
        #[arg(long, default_value_t = 0)]
        pack_balance: u64,
    },
    /// Print the calls that mint Epic Boxes to a recipient.
    MintPlan {
        #[arg(long)]
        chain: Chain,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: u32,
    },
    /// Store service endpoints for a chain in the deployments store.
    Configure {
        #[arg(long)]
        chain: Chain,
        #[arg(long)]
        indexer_url: Option<Url>,
        #[arg(long)]
        sync_url: Option<Url>,
        #[arg(long)]
        marketplace_slug: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct PollArgs {
    #[arg(long)]
    indexer_url: Option<Url>,

    #[arg(long)]
    sync_url: Option<Url>,

    #[arg(long)]
    sync_path: Option<String>,

    #[arg(long)]
    max_attempts: Option<u32>,

    #[arg(long)]
    delay_ms: Option<u64>,

    /// Wait the same delay after every attempt instead of backing off.
    #[arg(long)]
    constant_delay: bool,

    #[arg(long)]
    fail_on_ambiguous: bool,
}

impl PollArgs {
    fn config(&self) -> PollerConfig {
        self.apply(PollerConfig::from_env())
    }

    /// Flags win over the environment. A bare `--delay-ms` keeps the retry mode
    /// the environment picked.
    fn apply(&self, mut config: PollerConfig) -> PollerConfig {
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        let delay = self.delay_ms.map(Duration::from_millis);
        if self.constant_delay {
            let delay = delay.unwrap_or(match config.retry {
                RetryStrategy::Constant { delay } => delay,
                RetryStrategy::ExponentialJitter { base, .. } => base,
            });
            config.retry = RetryStrategy::Constant { delay };
        } else if let Some(base) = delay {
            config.retry = match config.retry {
                RetryStrategy::ExponentialJitter { max, .. } => RetryStrategy::ExponentialJitter {
                    base,
                    max: max.max(base),
                },
                RetryStrategy::Constant { .. } => RetryStrategy::Constant { delay: base },
            };
        }
        if self.fail_on_ambiguous {
            config.ambiguity = AmbiguityPolicy::FailFast;
        }
        config
    }

    fn endpoints(&self, record: &DeploymentRecord) -> Result<ServiceEndpoints> {
        let indexer_url = pick_url(self.indexer_url.as_ref(), record.indexer_url.as_deref())
            .wrap_err("resolving indexer url")?
            .ok_or_else(|| {
                eyre!(
                    "no indexer url for {}; pass --indexer-url or run `epic-box configure`",
                    record.chain
                )
            })?;
        let sync_url = pick_url(self.sync_url.as_ref(), record.sync_url.as_deref())
            .wrap_err("resolving sync url")?
            .ok_or_else(|| {
                eyre!(
                    "no sync url for {}; pass --sync-url or run `epic-box configure`",
                    record.chain
                )
            })?;
        let mut endpoints = ServiceEndpoints::new(indexer_url, sync_url);
        if let Some(path) = &self.sync_path {
            endpoints.sync_path = path.clone();
        }
        Ok(endpoints)
    }
}

fn pick_url(cli: Option<&Url>, stored: Option<&str>) -> Result<Option<String>> {
    if let Some(url) = cli {
        return Ok(Some(url.to_string()));
    }
    stored
        .map(|raw| {
            Url::parse(raw)
                .map(|url| url.to_string())
                .wrap_err_with(|| format!("stored url '{raw}' is invalid"))
        })
        .transpose()
}

fn store_error(e: anyhow::Error) -> Report {
    eyre!("{e:#}")
}

fn load_record(chain: Chain) -> Result<DeploymentRecord> {
    DeploymentStore::new(chain)
        .resolve()
        .map_err(store_error)
        .wrap_err_with(|| format!("loading deployment for {chain}"))
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "epic-box.log"));
            let _ = fmt()
                .with_env_filter(filter())
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

/// Resolves on Ctrl-C. Never resolves when the signal cannot be watched.
async fn handle_interupt() {
    let res = tokio::signal::ctrl_c().await;
    match res {
        Ok(_) => {
            tracing::info!("Received interrupt, cancelling polls");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for interrupts, polls run to completion");
            std::future::pending::<()>().await;
        }
    }
}

fn clients(endpoints: &ServiceEndpoints) -> Result<(IndexerClient, BackendSyncClient)> {
    let index = IndexerClient::new(&endpoints.indexer_url, endpoints.request_timeout)?;
    let sync = BackendSyncClient::new(
        &endpoints.sync_url,
        &endpoints.sync_path,
        endpoints.request_timeout,
    )?;
    Ok((index, sync))
}

async fn run_poll(
    chain: Chain,
    kind: EntityKind,
    id: u64,
    poll: &PollArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let record = load_record(chain)?;
    let endpoints = poll.endpoints(&record)?;
    let (index, sync) = clients(&endpoints)?;
    tracing::info!(%index, %sync, "polling");
    let request = PollRequest::new(chain.slug(), kind, id);
    let entity = poll_entity(&index, &sync, &request, &poll.config(), cancel)
        .await
        .wrap_err_with(|| format!("waiting for {kind} {id} on {chain}"))?;
    println!(
        "{kind} {} indexed: owner {}, block {}, tx index {}",
        entity.id, entity.owner, entity.block_hash, entity.transaction_index
    );
    Ok(())
}

async fn run_reveal(
    chain: Chain,
    receipt: &Path,
    poll: &PollArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let record = load_record(chain)?;
    let raw = fs::read(receipt)
        .wrap_err_with(|| format!("reading receipt {}", receipt.display()))?;
    let logs = parse_receipt_logs(&raw)?;
    let contracts = RewardContracts::from_record(&record)?;
    let rewards = decode_rewards(&logs, redeemer_address(&record)?, &contracts)?;
    if rewards.is_empty() {
        bail!("receipt {} holds no redemption rewards", receipt.display());
    }

    let endpoints = poll.endpoints(&record)?;
    let (index, sync) = clients(&endpoints)?;
    let outcome = reveal(&index, &sync, chain.slug(), rewards, &poll.config(), cancel).await;
    let revealed = outcome.into_result()?;
    for item in revealed {
        let reward = &item.reward;
        match &record.marketplace_slug {
            Some(slug) => println!(
                "{:<6} #{}  {}",
                reward.asset_kind,
                reward.token_id,
                marketplace_link(slug, reward)
            ),
            None => println!("{:<6} #{}", reward.asset_kind, reward.token_id),
        }
    }
    Ok(())
}

fn run_plan_packs(chain: Chain, rewards: &Path, pack_balance: u64) -> Result<()> {
    let record = load_record(chain)?;
    let pack_contract = pack_address(&record)?;
    let raw = fs::read(rewards)
        .wrap_err_with(|| format!("reading rewards {}", rewards.display()))?;
    let holdings: Vec<Holding> =
        serde_json::from_slice(&raw).wrap_err("parsing reward holdings")?;
    let plan = plan_pack_contents(&collect_rewards(&holdings), pack_balance)?
        .on_contract(pack_contract);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_mint_plan(chain: Chain, recipient: &str, amount: u32) -> Result<()> {
    let record = load_record(chain)?;
    let plan = MintPlan::new(&record, recipient, amount)?;
    println!("Chain: {}", plan.chain_name);
    println!("Contract Address: {}", plan.box_contract);
    println!("Minting {} token(s) to: {}", plan.amount, plan.recipient);
    println!("Using tokenURI: {}", plan.token_uri);
    println!("Function: {}, gas limit: {:?}", plan.function, plan.gas_limit);
    println!(
        "Minimum signer balance: {} wei of {}",
        plan.min_balance(),
        plan.symbol
    );
    for (i, call) in plan.calldata().iter().enumerate() {
        println!("{} 0x{}", i + 1, hex::encode(call));
    }
    Ok(())
}

fn run_configure(
    chain: Chain,
    indexer_url: Option<Url>,
    sync_url: Option<Url>,
    marketplace_slug: Option<String>,
) -> Result<()> {
    let store = DeploymentStore::new(chain);
    let mut record = store.resolve().map_err(store_error)?;
    if let Some(url) = indexer_url {
        record.indexer_url = Some(url.to_string());
    }
    if let Some(url) = sync_url {
        record.sync_url = Some(url.to_string());
    }
    if marketplace_slug.is_some() {
        record.marketplace_slug = marketplace_slug;
    }
    store
        .save(record)
        .map_err(store_error)
        .wrap_err("saving deployment")?;
    println!("Saved deployment for {chain} to {}", store.path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = if args.tracing || args.log_dir.is_some() {
        init_tracing(args.log_dir.as_deref())
    } else {
        None
    };

    let (handle, cancel) = cancellation();
    tokio::spawn(async move {
        handle_interupt().await;
        handle.cancel();
    });

    match args.command {
        Command::Poll {
            chain,
            kind,
            id,
            poll,
        } => run_poll(chain, kind, id, &poll, &cancel).await,
        Command::Reveal {
            chain,
            receipt,
            poll,
        } => run_reveal(chain, &receipt, &poll, &cancel).await,
        Command::PlanPacks {
            chain,
            rewards,
            pack_balance,
        } => run_plan_packs(chain, &rewards, pack_balance),
        Command::MintPlan {
            chain,
            recipient,
            amount,
        } => run_mint_plan(chain, &recipient, amount),
        Command::Configure {
            chain,
            indexer_url,
            sync_url,
            marketplace_slug,
        } => run_configure(chain, indexer_url, sync_url, marketplace_slug),
    }
}
