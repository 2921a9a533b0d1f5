mod error;
mod tooling;

pub use error::{ConvertError, Error, MediaError, ProvisionError, SettingsError};
pub use tooling::{
    convert_media, inspect_media, open_path, prepare_tools, tools_status, ArchiveFetcher,
    BinaryAsset, ConversionPlan, ConversionRequest, ConversionResult, Executor, MediaInfo,
    MediaKind, Planner, Platform, ProbeSummary, Prober, Provisioner, StreamKind, TargetFormat,
    ToolEnv, ToolStatus, ToolkitSettings, ToolsSource, ToolsStatus, UreqFetcher,
};
