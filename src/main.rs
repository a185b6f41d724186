use anyhow::Context as _;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use sslctx::{build_context, probe, ContextConfig, KeystoreFormat};
use std::io::IsTerminal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// SSL Context Utils - build a TLS client context from a key store and
/// optionally probe an HTTPS URL with it
#[derive(Parser, Debug)]
#[command(name = "sslctx", version, disable_help_flag = true)]
struct Cli {
    /// Key store path
    #[arg(short = 'k', long = "keystore", value_name = "PATH")]
    keystore: Option<String>,

    /// Password for the key store
    #[arg(short = 'p', long = "password", value_name = "PASSWORD")]
    password: Option<String>,

    /// Key store type, PKCS12 or JKS (default: guessed from the file extension)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    keystore_type: Option<String>,

    /// Protocol version
    #[arg(short = 'v', long = "protocol", value_name = "PROTOCOL", default_value = sslctx::config::DEFAULT_PROTOCOL)]
    protocol: String,

    /// Security provider (default: the OpenSSL default provider)
    #[arg(short = 's', long = "provider", value_name = "PROVIDER")]
    provider: Option<String>,

    /// URL to connect to (for e.g. https://secureserver.com/index.html)
    #[arg(short = 'u', long = "url", value_name = "URL")]
    url: Option<String>,

    /// Require strict hostname matching (not supported yet; always fails)
    #[arg(long = "strict")]
    strict: bool,

    /// Print this message and exit
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => e.exit(),
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try -h option to get help.");
            std::process::exit(1);
        }
    };

    if cli.help {
        print_help_and_exit(None);
    }

    if cli.keystore.is_none() || cli.password.is_none() {
        print_help_and_exit(Some("You must specify key store path and password as arguments."));
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let (Some(keystore), Some(password)) = (cli.keystore, cli.password) else {
        anyhow::bail!("key store path and password are required");
    };

    let mut builder = ContextConfig::builder(keystore, password)
        .protocol(cli.protocol)
        .strict_name_matching(cli.strict);
    if let Some(keystore_type) = cli.keystore_type {
        builder = builder.keystore_type(keystore_type.parse::<KeystoreFormat>()?);
    }
    if let Some(provider) = cli.provider {
        builder = builder.provider(provider);
    }
    let config = builder.build()?;

    let context = build_context(&config).context("Creating TLS context failed")?;
    info!("Context initialized successfully: {}", config);
    println!("Successfully created TLS context");

    if let Some(url) = cli.url {
        println!("Connecting to: [{}]", url);
        for line in probe(&context, &url).with_context(|| format!("Probing [{}] failed", url))? {
            println!("< {}", line?);
        }
    }

    Ok(())
}

fn print_help_and_exit(message: Option<&str>) -> ! {
    if let Some(message) = message {
        eprintln!("{}", message);
    }
    eprintln!();
    eprintln!("{}", Cli::command().render_help());
    std::process::exit(1);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
}
