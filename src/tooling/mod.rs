use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use url::Url;
use zip::ZipArchive;

use crate::error::{ConvertError, Error, MediaError, ProvisionError, SettingsError};

mod commands;
mod conversion;
mod install;
mod media_io;
mod platform;
mod runtime;

use conversion::*;
use install::*;
use media_io::*;
use platform::*;
use runtime::*;

pub use commands::{convert_media, inspect_media, open_path, prepare_tools, tools_status};
pub use conversion::{
    ConversionPlan, ConversionRequest, ConversionResult, Executor, Planner, TargetFormat,
};
pub use install::{ArchiveFetcher, Provisioner, UreqFetcher};
pub use media_io::{MediaInfo, MediaKind, ProbeSummary, Prober, StreamKind};
pub use platform::{BinaryAsset, Platform};
pub use runtime::{ToolEnv, ToolStatus, ToolkitSettings, ToolsSource, ToolsStatus};
