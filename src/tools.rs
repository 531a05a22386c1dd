//! # External Tool Utilities
//!
//! Questo modulo centralizza tutta la logica per la gestione cross-platform
//! dei tool codec esterni (mozjpeg, pngquant, oxipng, ...).
//!
//! ## Responsabilità:
//! - Mapping dei nomi comando per piattaforma (.exe su Windows)
//! - Check asincrono di disponibilità dei tool via which/where
//! - Apertura della directory di output nel file manager di sistema
//!   (usata dalla CLI, mai dalla pipeline)

use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Platform-specific command manager for the external codec tools
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    /// Initialize platform-specific commands
    fn new() -> Self {
        let (commands, which_command) = if cfg!(windows) {
            let mut commands = HashMap::new();
            commands.insert("mozjpeg", "mozjpeg.exe");
            commands.insert("jpegoptim", "jpegoptim.exe");
            commands.insert("jpegtran", "jpegtran.exe");
            commands.insert("pngquant", "pngquant.exe");
            commands.insert("oxipng", "oxipng.exe");
            (commands, "where")
        } else {
            let mut commands = HashMap::new();
            commands.insert("mozjpeg", "mozjpeg");
            commands.insert("jpegoptim", "jpegoptim");
            commands.insert("jpegtran", "jpegtran");
            commands.insert("pngquant", "pngquant");
            commands.insert("oxipng", "oxipng");
            (commands, "which")
        };

        Self {
            commands,
            which_command,
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).unwrap_or(&base_name)
    }

    /// Get the command used to check if a program exists
    pub fn which_command(&self) -> &str {
        self.which_command
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        let command_name = self.get_command(base_name);

        let result = tokio::process::Command::new(self.which_command)
            .arg(command_name)
            .output()
            .await;

        match result {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

/// Checks which codec tool categories are usable on this system.
///
/// Missing tools for one format only cause errors when that format is
/// actually encountered; the check fails only when no tools exist at all.
pub async fn check_codec_tools() -> anyhow::Result<()> {
    let platform = PlatformCommands::instance();
    let mut available = Vec::new();
    let mut missing = Vec::new();

    info!("🔧 Checking codec tool dependencies...");

    let jpeg_tools = ["mozjpeg", "jpegoptim", "jpegtran"];
    let has_jpeg = join_all(jpeg_tools.iter().map(|t| platform.is_command_available(t)))
        .await
        .into_iter()
        .any(|found| found);
    if has_jpeg {
        available.push("JPEG");
    } else {
        missing.push("JPEG (install one of: mozjpeg, jpegoptim, jpegtran)");
    }

    let png_tools = ["pngquant", "oxipng"];
    let has_png = join_all(png_tools.iter().map(|t| platform.is_command_available(t)))
        .await
        .into_iter()
        .any(|found| found);
    if has_png {
        available.push("PNG");
    } else {
        missing.push("PNG (install one of: pngquant, oxipng)");
    }

    if !available.is_empty() {
        info!("✅ Available codec categories: {}", available.join(", "));
    }

    if !missing.is_empty() {
        warn!("⚠️ Missing codec tools (these formats will fail if encountered):");
        for category in &missing {
            warn!("  ❌ {}", category);
        }
    }

    if available.is_empty() {
        anyhow::bail!(
            "No codec tools available. Please install at least one of: \
             mozjpeg, jpegoptim, jpegtran, pngquant, oxipng"
        );
    }

    Ok(())
}

/// Opens a directory in the platform file manager.
///
/// This is a caller-side convenience for the CLI; the pipeline itself never
/// touches UI state.
pub async fn open_in_file_manager(dir: &Path) -> anyhow::Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };

    let status = tokio::process::Command::new(opener)
        .arg(dir)
        .status()
        .await?;

    if !status.success() {
        anyhow::bail!("{} exited with {} for {}", opener, status, dir.display());
    }

    Ok(())
}
