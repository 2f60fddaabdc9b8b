use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use geosnap::auth::{self, StoredSession, TokenSource, UserInfo};
use geosnap::config::{self, Settings};
use geosnap::desktop::{DirectoryGallery, FileCamera, FixedLocation, LogNotices, StaticPermissions};
use geosnap::drive::{Drive, HttpDriveApi};
use geosnap::imaging::{ImageBackend, RustBackend};
use geosnap::platform::{Capability, Device};
use geosnap::process::UploadProcessor;
use geosnap::reminder::{ReminderScheduler, StoredReminders};
use geosnap::session::{Session, TakeOutcome};
use geosnap::store::{self, LocalStore};
use geosnap::subscription::{SubscriptionClient, build_payment_url};
use geosnap::types::PhotoData;
use geosnap::{output, metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LAST_PHOTO_FILE: &str = "last-photo.json";

/// Coordinates the desktop "location provider" reports.
#[derive(clap::Args, Clone, Default)]
struct LocationArgs {
    /// Latitude in signed decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Longitude in signed decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,
    /// Altitude in meters (negative below sea level)
    #[arg(long, allow_negative_numbers = true)]
    alt: Option<f64>,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum PermissionArg {
    Camera,
    Location,
    Gallery,
    Notifications,
}

impl From<PermissionArg> for Capability {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Camera => Capability::Camera,
            PermissionArg::Location => Capability::Location,
            PermissionArg::Gallery => Capability::MediaLibrary,
            PermissionArg::Notifications => Capability::Notifications,
        }
    }
}

#[derive(Parser)]
#[command(name = "geosnap")]
#[command(about = "Geotagged photo capture and upload to Google Drive")]
#[command(long_about = "\
Geotagged photo capture and upload to Google Drive

On the desktop, \"taking a picture\" imports an existing image file. The
location comes from --lat/--lon/--alt (or the photo's own EXIF GPS).

Pipeline:

  capture   photo + size, GPS, dimensions
  overlay   coordinates and date burned into the image
  process   resize/compress per settings, EXIF GPS tags
  upload    Drive: <root folder>/<YYYY-MM-DD>/<name>.jpg

Sign in with 'geosnap login --email <addr> --token <access token>' or set
GEOSNAP_ACCESS_TOKEN. Logging is controlled by RUST_LOG (default: info).

Run 'geosnap gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the local store
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Directory for intermediate files (composed and processed photos)
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take a photo from a file and run the configured flow
    Capture {
        /// Image file acting as the shutter result
        photo: PathBuf,
        /// Upload name without extension (default: timestamp)
        #[arg(long)]
        name: Option<String>,
        /// With preview enabled, save and upload instead of stopping at the preview
        #[arg(long)]
        save: bool,
        /// Deny a permission to exercise the fallback paths
        #[arg(long, value_enum)]
        deny: Vec<PermissionArg>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Burn the overlay text into a photo
    Compose {
        photo: PathBuf,
        /// Where to write the result (default: work directory)
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Resize, compress and GPS-tag a photo for upload
    Process {
        photo: PathBuf,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Upload a JPEG to Drive as-is
    Upload {
        photo: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show subscription status and payment link
    Subscription,
    /// Print this device's equipment id
    EquipmentId {
        /// Forget the current id and generate a new one
        #[arg(long)]
        reset: bool,
    },
    /// Store a Google account and access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Forget the stored account and token
    Logout,
    /// List scheduled reminders
    Reminders {
        /// Cancel all scheduled reminders
        #[arg(long)]
        clear: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
    /// Validate config.toml without doing anything else
    CheckConfig,
}

/// Long-lived pieces shared by every command that touches photos or Drive.
struct App {
    config_dir: PathBuf,
    work_dir: PathBuf,
    store: Arc<LocalStore>,
    backend: Arc<dyn ImageBackend>,
}

impl App {
    fn open(config_dir: PathBuf, work_dir: PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&work_dir)?;
        let store = Arc::new(LocalStore::in_dir(&config_dir)?);
        Ok(Self {
            config_dir,
            work_dir,
            store,
            backend: Arc::new(RustBackend::new()),
        })
    }

    fn settings(&self) -> Result<Settings, config::ConfigError> {
        config::load_config(&self.config_dir)
    }

    fn tokens(&self) -> StoredSession {
        StoredSession::new(Arc::clone(&self.store))
    }

    fn drive(&self, settings: &Settings) -> Result<Drive, Box<dyn std::error::Error>> {
        let api = HttpDriveApi::new(&settings.drive)?;
        Ok(Drive::new(Arc::new(api), Arc::new(self.tokens()), &settings.drive))
    }

    fn device(
        &self,
        settings: &Settings,
        photo: Option<PathBuf>,
        location: &LocationArgs,
        deny: &[PermissionArg],
    ) -> Device {
        let denied: Vec<Capability> = deny.iter().map(|d| Capability::from(*d)).collect();
        Device {
            permissions: Arc::new(StaticPermissions::denying(&denied)),
            camera: Arc::new(FileCamera::new(photo, &self.work_dir, Arc::clone(&self.backend))),
            location: Arc::new(FixedLocation::from_args(location.lat, location.lon, location.alt)),
            notices: Arc::new(LogNotices),
            gallery: Arc::new(DirectoryGallery::new(settings.gallery.resolved_directory())),
            reminders: Arc::new(StoredReminders::new(Arc::clone(&self.store))),
        }
    }

    fn session(
        &self,
        photo: Option<PathBuf>,
        location: &LocationArgs,
        deny: &[PermissionArg],
    ) -> Result<Session, Box<dyn std::error::Error>> {
        let settings = self.settings()?;
        let device = self.device(&settings, photo, location, deny);
        let drive = self.drive(&settings)?;
        Ok(Session::new(
            settings,
            device,
            Arc::clone(&self.backend),
            drive,
            &self.work_dir,
        ))
    }

    /// Photo metadata for a file given on the command line.
    fn describe(&self, path: &Path, location: &LocationArgs) -> PhotoData {
        let dims = self.backend.identify(path).ok();
        let (exif_lat, exif_lon) = match self.backend.read_exif(path) {
            Ok(tags) => metadata::coords_from_exif(&tags.to_json_map()),
            Err(_) => (None, None),
        };
        PhotoData {
            path: path.to_path_buf(),
            file_size_bytes: std::fs::metadata(path).ok().map(|m| m.len()),
            latitude: metadata::resolve(&[location.lat, exif_lat]),
            longitude: metadata::resolve(&[location.lon, exif_lon]),
            width: dims.map(|d| d.width),
            height: dims.map(|d| d.height),
        }
    }
}

fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("geosnap")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(config::default_config_dir);
    let work_dir = cli.work_dir.unwrap_or_else(default_work_dir);

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::CheckConfig => {
            let path = config_dir.join(config::CONFIG_FILE);
            println!("==> Checking {}", path.display());
            config::load_config(&config_dir)?;
            println!("==> Config is valid");
        }
        Command::Capture {
            photo,
            name,
            save,
            deny,
            location,
        } => {
            let app = App::open(config_dir, work_dir)?;
            let session = app.session(Some(photo), &location, &deny)?;
            match session.take_photo_and_upload(name.as_deref()).await {
                TakeOutcome::NoPhoto => return Err("no photo taken".into()),
                TakeOutcome::Uploaded { photo, file } => {
                    output::print_photo(&photo);
                    match file {
                        Some(file) => output::print_uploaded(&file),
                        None => return Err("upload failed".into()),
                    }
                }
                TakeOutcome::Preview(photo) => {
                    output::print_photo(&photo);
                    if !save {
                        let json = serde_json::to_string_pretty(&photo)?;
                        std::fs::write(app.work_dir.join(LAST_PHOTO_FILE), json)?;
                        println!("==> Preview only; rerun with --save to upload");
                        return Ok(());
                    }
                    let Some(handle) = session.save_prepared_photo(&photo, name).await else {
                        return Err("not uploaded: sign in first".into());
                    };
                    match handle.await? {
                        Some(file) => output::print_uploaded(&file),
                        None => return Err("upload failed".into()),
                    }
                }
            }
        }
        Command::Compose {
            photo,
            output: dest,
            location,
        } => {
            let app = App::open(config_dir, work_dir)?;
            let session = app.session(None, &location, &[])?;
            let data = app.describe(&photo, &location);
            let composed = session.compose_with_retries(&data, &Local::now()).await;
            if composed == photo {
                return Err("nothing composed (no overlay lines or render failed)".into());
            }
            let result = match dest {
                Some(dest) => {
                    std::fs::copy(&composed, &dest)?;
                    dest
                }
                None => composed,
            };
            println!("{}", result.display());
        }
        Command::Process { photo, location } => {
            let app = App::open(config_dir, work_dir)?;
            let settings = app.settings()?;
            let device = app.device(&settings, None, &location, &[]);
            let data = app.describe(&photo, &location);
            let processor = UploadProcessor::new(Arc::clone(&app.backend), &app.work_dir);
            let processed = processor
                .process_photo_for_upload(&settings, &device, &photo, data.latitude, data.longitude)
                .await;
            println!("{}", processed.display());
        }
        Command::Upload { photo, name } => {
            let app = App::open(config_dir, work_dir)?;
            let settings = app.settings()?;
            let drive = app.drive(&settings)?;
            let file = drive.upload_photo(&photo, Local::now(), name.as_deref()).await?;
            output::print_uploaded(&file);
        }
        Command::Subscription => {
            let app = App::open(config_dir, work_dir)?;
            let settings = app.settings()?;
            let email = app.tokens().user().map(|u| u.email);
            let equipment_id = store::equipment_id(&app.store)?;
            let client = SubscriptionClient::new(&settings.subscription)?;
            let info = client
                .fetch_subscription(email.as_deref(), &equipment_id)
                .await?;
            let payment = build_payment_url(
                &settings.subscription.payment_url,
                email.as_deref(),
                &equipment_id,
            )?;
            for line in output::format_subscription(info.as_ref(), &equipment_id, &payment) {
                println!("{}", line);
            }
        }
        Command::EquipmentId { reset } => {
            let store = LocalStore::in_dir(&config_dir)?;
            if reset {
                store::reset_equipment_id(&store)?;
            }
            println!("{}", store::equipment_id(&store)?);
        }
        Command::Login {
            email,
            token,
            display_name,
        } => {
            let store = LocalStore::in_dir(&config_dir)?;
            let user = UserInfo {
                email,
                name: display_name,
            };
            auth::login(&store, &user, &token)?;
            println!("Signed in as {}", user.email);
        }
        Command::Logout => {
            let store = LocalStore::in_dir(&config_dir)?;
            auth::logout(&store)?;
            println!("Signed out");
        }
        Command::Reminders { clear } => {
            let store = Arc::new(LocalStore::in_dir(&config_dir)?);
            let reminders = StoredReminders::new(store);
            if clear {
                reminders.cancel_all().await?;
            }
            output::print_reminders(&reminders.pending().await?, Utc::now());
        }
    }

    Ok(())
}
