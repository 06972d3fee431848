use anyhow::Context;
use clap::Parser;
use pg_audit_trail::host::Backend;
use pg_audit_trail::logging::init_logging;
use pg_audit_trail::session::SessionScript;
use pg_audit_trail::{AuditTrail, Config};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pg-audit-trail")]
#[command(about = "Replay a scripted session with the audit hooks loaded", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE", help = "JSON array of statements to execute")]
    session: PathBuf,

    #[arg(long, help = "Run the session as a superuser")]
    superuser: bool,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    config.logging.json |= args.json_logs;
    config.logging.verbose |= args.verbose;
    init_logging(&config.logging)?;

    info!(
        log_nested_statements = config.audit.log_nested_statements,
        superuser = args.superuser,
        "Configuration summary"
    );

    let script = SessionScript::from_file(&args.session)
        .with_context(|| format!("failed to read session {:?}", args.session))?;

    let backend = Backend::simulated().with_superuser(args.superuser);
    let audit = AuditTrail::load(&backend, &config.audit)?;

    let summary = script.replay(&backend);
    info!(
        statements_audited = audit.statements_audited(),
        "Session complete"
    );
    audit.unload(&backend);

    if summary.failed > 0 {
        error!("{} of {} statements failed", summary.failed, script.statements.len());
        std::process::exit(1);
    }

    Ok(())
}
