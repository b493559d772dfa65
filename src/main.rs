//! localca CLI: create root CAs, issue certificates signed by them and manage the store
//! that tracks their files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use localca::authority::{self, IssueParams};
use localca::cert::Certificate;
use localca::cert::extensions::SubjectAltName;
use localca::cert::params::DistinguishedName;
use localca::key::{KeyAlgorithm, KeyType};
use localca::record::{KeyCertRecord, RecordPaths};
use localca::store::{Store, StoreConfig};

/// Local certificate authority manager.
#[derive(Parser, Debug)]
#[command(name = "localca", version, about)]
struct Cli {
    /// Directory holding the record file and issued identities
    #[arg(long, global = true, env = "LOCALCA_STORE_DIR", default_value = "out")]
    store_dir: PathBuf,

    /// Name of the record file inside the store directory
    #[arg(
        long,
        global = true,
        env = "LOCALCA_RECORD_FILE",
        default_value = "store.json"
    )]
    record_file: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a self-signed root CA
    CreateCa {
        /// Name of the CA; also its common name
        name: String,

        #[command(flatten)]
        issue: IssueArgs,
    },

    /// Create a key and certificate signed by a CA in the store
    CreateSignedPair {
        /// Name of the new identity; also its common name
        name: String,

        /// Name of the issuing CA
        #[arg(long)]
        ca: String,

        #[command(flatten)]
        issue: IssueArgs,
    },

    /// List all records in the store
    List,

    /// Show a record and its certificate
    Show {
        name: String,
    },

    /// Remove a record from the store (its files are kept)
    Remove {
        name: String,
    },
}

impl Commands {
    /// Commands that never write the store may run on a partially loaded one.
    fn is_read_only(&self) -> bool {
        matches!(self, Commands::List | Commands::Show { .. })
    }
}

#[derive(Args, Debug)]
struct IssueArgs {
    /// Key type: rsa, ecdsa-p256, ecdsa-p384 or ed25519
    #[arg(long, default_value = "rsa")]
    key_type: KeyType,

    /// RSA key length in bits
    #[arg(long, default_value_t = 2048)]
    bits: usize,

    /// Validity in years
    #[arg(long, default_value_t = 5)]
    years: u32,

    /// Subject alternative names, e.g. "DNS:svc.local, IP:10.0.0.1"
    #[arg(long)]
    alt_names: Option<String>,

    /// Extra subject attribute (C, ST, L, O, OU or emailAddress); repeatable
    #[arg(long = "subject", value_name = "KEY=VALUE")]
    subject: Vec<String>,

    /// Directory for the key and certificate (default: <store-dir>/<name>)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Path of the private key file
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Path of the certificate file
    #[arg(long)]
    cert_file: Option<PathBuf>,
}

impl IssueArgs {
    fn into_params(self, name: String) -> Result<IssueParams> {
        let mut subject = DistinguishedName::default();
        for pair in &self.subject {
            subject.set_pair(pair)?;
        }

        Ok(IssueParams {
            name,
            key_algorithm: KeyAlgorithm::from_parts(self.key_type, self.bits)?,
            years: self.years,
            alt_names: self.alt_names,
            subject,
            paths: RecordPaths {
                dir_name: self.dir,
                key_file: self.key_file,
                cert_file: self.cert_file,
                ca_file: None,
            },
        })
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = StoreConfig {
        store_dir: cli.store_dir,
        record_file: cli.record_file,
    };
    let mut store = Store::new(config.clone());
    if let Err(e) = store.load() {
        let e = anyhow::Error::new(e).context(format!(
            "failed to load {}",
            config.record_file_path().display()
        ));
        if !cli.command.is_read_only() {
            return Err(e);
        }
        log::warn!("{e:#}; showing the records that could be read");
    }

    let mutated = match cli.command {
        Commands::CreateCa { name, issue } => {
            let record = authority::create_ca(&mut store, &issue.into_params(name)?)?;
            print_record(&record);
            true
        }
        Commands::CreateSignedPair { name, ca, issue } => {
            let record = authority::create_signed_pair(&mut store, &ca, &issue.into_params(name)?)?;
            print_record(&record);
            true
        }
        Commands::List => {
            cmd_list(&store);
            false
        }
        Commands::Show { name } => {
            cmd_show(&store, &name)?;
            false
        }
        Commands::Remove { name } => {
            let record = store.remove(&name)?;
            println!(
                "Removed '{}' from the store; files in {} were left in place",
                record.name,
                record.dir_name.display()
            );
            true
        }
    };

    if mutated {
        store.save().context("failed to save the store")?;
    }
    Ok(())
}

fn print_record(record: &KeyCertRecord) {
    println!("{}", record.name);
    println!("  Key:  {}", record.key_file.display());
    println!("  Cert: {}", record.cert_file.display());
    println!("  CA:   {}", record.ca_file.display());
}

/// `localca list`
fn cmd_list(store: &Store) {
    if store.is_empty() {
        println!("No certificates in the store.");
        return;
    }
    for record in store.records() {
        print_record(record);
    }
    println!("Next serial: {}", store.serial());
}

/// `localca show NAME`
fn cmd_show(store: &Store, name: &str) -> Result<()> {
    let record = store.get(name)?;
    print_record(record);
    println!("  Dir:  {}", record.dir_name.display());

    let pem = std::fs::read_to_string(&record.cert_file)
        .with_context(|| format!("failed to read {}", record.cert_file.display()))?;
    let cert = Certificate::from_pem(&pem)?;
    let tbs = cert.to_tbs()?;

    println!("  Subject:    {}", cert.subject());
    println!("  Issuer:     {}", cert.issuer());
    println!("  Serial:     {}", tbs.serial_number);
    println!("  Not before: {}", tbs.validity.not_before);
    println!("  Not after:  {}", tbs.validity.not_after);
    println!("  CA:         {}", cert.is_ca()?);
    match cert.find_extension::<SubjectAltName>() {
        Ok(Some((san, _))) => {
            let names = san
                .names
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            println!("  Alt names:  {}", names.join(", "));
        }
        Ok(None) => {}
        Err(e) => println!("  Alt names:  unreadable ({e})"),
    }
    Ok(())
}
