use serde::Deserialize;

/// Item metadata returned when a sharing URL is resolved.
/// `GET {api}/shares/u!{encoded}/driveItem`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub name: Option<String>,
    pub size: Option<u64>,
    pub last_modified_date_time: Option<String>,
    pub e_tag: Option<String>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}
