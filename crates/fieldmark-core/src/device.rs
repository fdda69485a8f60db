//! Device identity: stable per-install id and human-readable name.

use std::fmt;

use uuid::Uuid;

use crate::db::MetaStore;
use crate::util::unix_timestamp_millis;

/// Meta-store key holding the persisted device id.
pub const DEVICE_ID_KEY: &str = "device_id";

/// Detected hardware class, used only for the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFactor {
    Mobile,
    Tablet,
    Desktop,
}

impl fmt::Display for FormFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
            Self::Desktop => "Desktop",
        })
    }
}

/// Runtime context a device name is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeContext {
    /// Installed/standalone app rather than a plain browser tab.
    pub installed_app: bool,
    pub form_factor: FormFactor,
}

impl RuntimeContext {
    /// Context for the installed CLI/desktop binary.
    #[must_use]
    pub const fn installed_desktop() -> Self {
        Self {
            installed_app: true,
            form_factor: FormFactor::Desktop,
        }
    }
}

/// Stable id plus display name for this install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

impl DeviceIdentity {
    /// Load the persisted device id, minting and persisting a fresh one on
    /// first use.
    ///
    /// An unavailable store degrades to an ephemeral id: presence attribution
    /// gets weaker, nothing fails.
    pub fn load_or_create(store: &dyn MetaStore, context: RuntimeContext) -> Self {
        let id = match store.get(DEVICE_ID_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => existing,
            Ok(_) => {
                let minted = mint_device_id();
                if let Err(error) = store.set(DEVICE_ID_KEY, &minted) {
                    tracing::warn!(%error, "Could not persist device id; using it for this session only");
                }
                minted
            }
            Err(error) => {
                tracing::warn!(%error, "Device id store unavailable; using an ephemeral id");
                mint_device_id()
            }
        };

        Self {
            id,
            name: device_name(context),
        }
    }
}

/// Mint a new device id from the current time plus a short random suffix.
///
/// Collisions are implausible at this system's fleet size but the id is NOT
/// cryptographically unique; do not treat it as one.
#[must_use]
pub fn mint_device_id() -> String {
    let millis = unix_timestamp_millis();
    let hex = Uuid::now_v7().simple().to_string();
    // The tail of a v7 uuid is the random section.
    let suffix = &hex[hex.len() - 6..];
    format!("dev-{millis}-{suffix}")
}

/// Human-readable device label. Pure function of the runtime context.
#[must_use]
pub fn device_name(context: RuntimeContext) -> String {
    let app = if context.installed_app {
        "Field App"
    } else {
        "Browser"
    };
    format!("{app} ({})", context.form_factor)
}
