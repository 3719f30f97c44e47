// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lab Certificate Command-Line Tool
//!
//! # Usage
//!
//! ```text
//! labcert [OPTIONS] <COMMAND>
//!
//! Commands:
//!   issue   Issue a certificate into the store
//!   export  Export certificates as .crt / .pfx
//!   list    List stored certificates
//!   config  Configuration management
//!
//! Options:
//!   -c, --config <PATH>       Path to configuration file
//!       --store-path <PATH>   Override the certificate store directory
//!   -v, --verbose             Enable verbose output
//!   -q, --quiet               Suppress non-error output
//!   -h, --help                Print help
//!   -V, --version             Print version
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Build a lab chain
//! labcert issue --cert-type Root --subject TestRootCA
//! labcert issue --cert-type Intermediate --subject TestIssuerCA --issuer TestRootCA
//! labcert issue --cert-type Web --subject web01.lab.local --san web01 --issuer TestIssuerCA
//!
//! # Export the issuing CA with its key
//! labcert export --subject TestIssuerCA --include-key --folder ./certs
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::SecretString;

use labcert::config::{write_default_config, ConfigLoader, LabCertConfig};
use labcert::store::{CertStore, FileCertStore};
use labcert::{
    CertificateExporter, CertificateIssuer, CertificateProfile, CertificateRequest, StoreContainer,
    StoreScope,
};

/// Lab Certificate Command-Line Tool
#[derive(Parser)]
#[command(name = "labcert")]
#[command(author = "U.S. Federal Government")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Issue and export lab PKI certificates", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the certificate store directory
    #[arg(long, global = true, value_name = "PATH")]
    store_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a certificate into the store
    Issue {
        /// Certificate profile
        #[arg(long, value_name = "TYPE")]
        cert_type: CertificateProfile,

        /// Subject common name or distinguished name
        #[arg(long, value_name = "SUBJECT")]
        subject: String,

        /// Store scope (LocalMachine, CurrentUser)
        #[arg(long, value_name = "SCOPE")]
        store: Option<StoreScope>,

        /// Additional DNS name (Web)
        #[arg(long = "san", value_name = "NAME")]
        san: Vec<String>,

        /// User principal name (ClientAuth)
        #[arg(long, value_name = "UPN")]
        upn: Option<String>,

        /// Target domain for the URL SAN (ClientAuth)
        #[arg(long, value_name = "DOMAIN")]
        target_domain: Option<String>,

        /// GUID SAN entry (ClientAuth); generated when omitted
        #[arg(long, value_name = "GUID")]
        guid: Option<String>,

        /// Subject of the signing certificate
        #[arg(long, value_name = "SUBJECT")]
        issuer: Option<String>,

        /// Lifetime in days
        #[arg(long, value_name = "N")]
        days: Option<u32>,

        /// Mark the private key non-exportable
        #[arg(long, conflicts_with = "exportable")]
        non_exportable: bool,

        /// Mark the private key exportable
        #[arg(long)]
        exportable: bool,
    },

    /// Export certificates as .crt, and with --include-key as .pfx
    Export {
        /// Subject substring to export (repeatable)
        #[arg(long = "subject", value_name = "SUBJECT", required = true)]
        subjects: Vec<String>,

        /// Target folder
        #[arg(long, value_name = "PATH")]
        folder: Option<PathBuf>,

        /// Store scope (LocalMachine, CurrentUser)
        #[arg(long, value_name = "SCOPE")]
        store: Option<StoreScope>,

        /// PFX password; generated per subject when omitted
        #[arg(long, env = "LABCERT_PFX_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Export the private key as PFX
        #[arg(long)]
        include_key: bool,

        /// Do not append passwords to CertInfo.txt
        #[arg(long)]
        no_password_log: bool,
    },

    /// List stored certificates
    List {
        /// Store scope (LocalMachine, CurrentUser)
        #[arg(long, value_name = "SCOPE")]
        store: Option<StoreScope>,

        /// Container (My, CA, Root); all when omitted
        #[arg(long, value_name = "CONTAINER")]
        container: Option<StoreContainer>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default configuration file
    Init {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Display effective configuration
    Show,

    /// Validate configuration file
    Validate,
}

type CmdResult = Result<ExitCode, Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // `config init` must work even when the current configuration is broken.
    if let Commands::Config {
        action: ConfigAction::Init { output, force },
    } = &cli.command
    {
        return finish(cmd_config_init(output.clone(), *force));
    }

    let (mut config, source) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(ref path) = cli.store_path {
        config.store.path = path.clone();
    }

    if let Err(e) = labcert::logging::init(&config.logging, cli.verbose, cli.quiet) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    if let Some(ref path) = source {
        tracing::debug!("Loaded configuration from {}", path.display());
    }

    finish(run_command(&cli, &config, source))
}

fn finish(result: CmdResult) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> labcert::Result<(LabCertConfig, Option<PathBuf>)> {
    let mut loader = ConfigLoader::new();
    if let Some(ref path) = cli.config {
        loader = loader.with_path(path);
    }
    loader.load()
}

fn run_command(cli: &Cli, config: &LabCertConfig, source: Option<PathBuf>) -> CmdResult {
    match &cli.command {
        Commands::Issue {
            cert_type,
            subject,
            store,
            san,
            upn,
            target_domain,
            guid,
            issuer,
            days,
            non_exportable,
            exportable,
        } => {
            let mut request = CertificateRequest::new(subject.as_str())
                .alt_names(san.iter().cloned())
                .validity_days(days.unwrap_or(config.issue.validity_days))
                .scope(store.unwrap_or(config.store.scope));
            request.user_principal_name = upn.clone();
            request.target_domain = target_domain.clone();
            request.guid = guid.clone();
            request.issuer_subject = issuer.clone();
            if *non_exportable {
                request = request.exportable(false);
            } else if *exportable {
                request = request.exportable(true);
            }
            cmd_issue(config, &request, *cert_type)
        }
        Commands::Export {
            subjects,
            folder,
            store,
            password,
            include_key,
            no_password_log,
        } => {
            let mut options = config.export_options().include_private_key(*include_key);
            if let Some(folder) = folder {
                options.target_folder = folder.clone();
            }
            if let Some(scope) = store {
                options = options.scope(*scope);
            }
            if *no_password_log {
                options = options.record_passwords(false);
            }
            if let Some(password) = password {
                options = options.password(SecretString::from(password.as_str()));
            }
            if options.include_private_key && !options.record_passwords && options.password.is_none()
            {
                return Err(labcert::Error::invalid_argument(
                    "--no-password-log with --include-key needs --password; \
                     a generated password would be lost",
                )
                .into());
            }
            cmd_export(config, subjects, &options)
        }
        Commands::List { store, container } => {
            cmd_list(config, store.unwrap_or(config.store.scope), *container)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(config, source),
            ConfigAction::Validate => cmd_config_validate(config, source),
            ConfigAction::Init { output, force } => cmd_config_init(output.clone(), *force),
        },
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn open_store(config: &LabCertConfig) -> Result<FileCertStore, labcert::StoreError> {
    FileCertStore::open(&config.store.path)
}

fn cmd_issue(
    config: &LabCertConfig,
    request: &CertificateRequest,
    profile: CertificateProfile,
) -> CmdResult {
    let store = open_store(config)?;
    let issued = CertificateIssuer::new(&store).issue(request, profile)?;

    let containers: Vec<&str> = issued.containers.iter().map(|c| c.as_str()).collect();
    println!("Issued {} certificate", issued.profile);
    println!("  Subject:     {}", issued.subject);
    println!("  Issuer:      {}", issued.issuer);
    println!("  Thumbprint:  {}", issued.thumbprint);
    println!("  Not Before:  {}", issued.not_before);
    println!("  Not After:   {}", issued.not_after);
    println!("  Store:       {}\\{}", issued.scope, containers.join(", "));
    println!("  Exportable:  {}", issued.key_exportable);
    Ok(ExitCode::SUCCESS)
}

fn cmd_export(
    config: &LabCertConfig,
    subjects: &[String],
    options: &labcert::ExportOptions,
) -> CmdResult {
    let store = open_store(config)?;
    let report = CertificateExporter::new(&store).export_batch(subjects, options)?;

    for artifact in &report.artifacts {
        println!("{} ({})", artifact.matched_subject, artifact.thumbprint);
        println!("  {}", artifact.certificate_path.display());
        if let Some(ref pfx) = artifact.pfx_path {
            println!("  {}", pfx.display());
        }
    }
    for failure in &report.failures {
        eprintln!("FAILED {}: {}", failure.subject, failure.error);
    }

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_list(
    config: &LabCertConfig,
    scope: StoreScope,
    container: Option<StoreContainer>,
) -> CmdResult {
    let store = open_store(config)?;
    let containers = match container {
        Some(c) => vec![c],
        None => StoreContainer::ALL.to_vec(),
    };

    for container in containers {
        let certs = store.list_certificates(scope, container)?;
        println!("{}\\{} ({})", scope, container, certs.len());
        for cert in certs {
            let key = match (&cert.private_key, cert.is_key_exportable()) {
                (None, _) => "no key",
                (Some(_), true) => "key, exportable",
                (Some(_), false) => "key",
            };
            let profile = cert.profile.map(|p| p.as_str()).unwrap_or("-");
            println!(
                "  {}  {}  {}  expires {}  [{}]",
                cert.thumbprint,
                profile,
                cert.subject,
                cert.not_after.date(),
                key
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(config: &LabCertConfig, source: Option<PathBuf>) -> CmdResult {
    match source {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No configuration file found; showing defaults"),
    }
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_validate(config: &LabCertConfig, source: Option<PathBuf>) -> CmdResult {
    // The loader already validated; repeat so overrides are checked too.
    config.validate()?;
    match source {
        Some(path) => println!("Configuration is valid: {}", path.display()),
        None => println!("No configuration file found; defaults are valid"),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init(output: Option<PathBuf>, force: bool) -> CmdResult {
    let path = output.unwrap_or_else(|| PathBuf::from("labcert.toml"));
    write_default_config(&path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(ExitCode::SUCCESS)
}
