use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tessera_cli::capture::{CameraProbe, OperatorSampleSource};
use tessera_cli::{
    AccessDecision, Config, DenialReason, EnrollmentSession, VerificationWorkflow,
    MAX_SAMPLES_PER_ENROLLMENT,
};
use tessera_core::MatchEngine;
use tessera_face::FaceEngine;
use tessera_hw::Camera;
use tessera_store::{
    AttendanceLedger, EmbeddingStore, IdentityDraft, IdentityLedger, KeyVault,
};

#[derive(Parser)]
#[command(name = "tessera", about = "Tessera biometric access-control and attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new identity and capture face samples
    Enroll {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
        /// Samples to capture this session (max 10)
        #[arg(long)]
        samples: Option<usize>,
    },
    /// Verify a claimed identity against the live camera
    Verify {
        /// Email of the claimed identity
        email: String,
    },
    /// Show attendance history for an email
    History {
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// List enrolled identities
    List {
        #[arg(long)]
        json: bool,
    },
    /// List available capture devices
    Devices,
}

struct Stores {
    identities: IdentityLedger,
    attendance: AttendanceLedger,
    embeddings: EmbeddingStore,
}

fn open_stores(config: &Config) -> Result<Stores> {
    let paths = config.store_paths();
    paths
        .ensure_layout()
        .with_context(|| format!("cannot create data directory {}", paths.data_dir().display()))?;

    let key = KeyVault::new(paths.key_file())
        .get_or_create()
        .context("configuration error: sealing key unusable")?;

    Ok(Stores {
        identities: IdentityLedger::new(paths.records_file()),
        attendance: AttendanceLedger::new(paths.attendance_file()),
        embeddings: EmbeddingStore::new(paths.certified_dir(), key),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Enroll {
            first_name,
            last_name,
            email,
            phone,
            address,
            samples,
        } => {
            let stores = open_stores(&config)?;
            let camera = Camera::open(&config.camera_device, config.capture_timeout())?;

            let requested = samples
                .unwrap_or(config.samples_per_enrollment)
                .min(MAX_SAMPLES_PER_ENROLLMENT);
            let draft = IdentityDraft {
                first_name,
                last_name,
                email,
                phone_number: phone,
                home_address: address,
            };

            let mut source = OperatorSampleSource::new(camera, requested);
            let outcome = EnrollmentSession::new(&stores.identities, &stores.embeddings)
                .run(draft, requested, &mut source)?;

            if outcome.samples_stored == outcome.samples_requested {
                println!(
                    "Enrolled {} as identity {} with all {} samples. Ready to check in.",
                    outcome.identity.display_name(),
                    outcome.identity.identity_id,
                    outcome.samples_stored,
                );
            } else {
                println!(
                    "Enrolled {} as identity {}, but captured only {} of {} samples.",
                    outcome.identity.display_name(),
                    outcome.identity.identity_id,
                    outcome.samples_stored,
                    outcome.samples_requested,
                );
            }
        }

        Commands::Verify { email } => {
            let stores = open_stores(&config)?;
            let mut face = FaceEngine::load(&config.model_dir)
                .context("configuration error: face models unavailable")?;
            let camera = Camera::open(&config.camera_device, config.capture_timeout())?;
            let mut probe = CameraProbe::new(camera);

            let workflow = VerificationWorkflow::new(
                &stores.identities,
                &stores.embeddings,
                &stores.attendance,
                MatchEngine::new(config.similarity_threshold),
            );

            match workflow.run(&email, &mut face, &mut probe)? {
                AccessDecision::Granted {
                    identity,
                    similarity,
                } => {
                    println!(
                        "Access granted. Welcome, {} (similarity {similarity:.2}).",
                        identity.display_name()
                    );
                    println!("Attendance recorded for {}.", identity.email);
                }
                AccessDecision::Denied(reason) => {
                    println!("{}", denial_message(reason));
                    std::process::exit(1);
                }
            }
        }

        Commands::History { email, json } => {
            let stores = open_stores(&config)?;
            let rows: Vec<_> = stores
                .attendance
                .history(&email)?
                .collect::<Result<_, _>>()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No attendance records for {email}.");
            } else {
                println!("Attendance for {email}:");
                for row in &rows {
                    println!("\t{}, {}", row.date, row.time);
                }
            }
        }

        Commands::List { json } => {
            let stores = open_stores(&config)?;
            let identities = stores.identities.list()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&identities)?);
            } else if identities.is_empty() {
                println!("No identities enrolled.");
            } else {
                for identity in &identities {
                    println!(
                        "{:>4}  {}  <{}>",
                        identity.identity_id,
                        identity.display_name(),
                        identity.email
                    );
                }
            }
        }

        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found.");
            } else {
                for dev in devices {
                    println!("{}  {} ({})", dev.path, dev.name, dev.driver);
                }
            }
        }
    }

    Ok(())
}

fn denial_message(reason: DenialReason) -> &'static str {
    match reason {
        DenialReason::NoSuchEmail => "Access denied: email not found. You are not enrolled.",
        DenialReason::NoGallery => {
            "Access denied: no usable enrolled face data for this identity."
        }
        DenialReason::NoProbeFace => {
            "Access denied: no face detected. Face the camera and try again."
        }
        DenialReason::NoMatch => "Access denied: face not recognized.",
    }
}
