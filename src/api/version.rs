#![forbid(unsafe_code)]

use poem_openapi::{ OpenApi, payload::Json, Object };

// From cargo.toml, stamped at build time.
const SERVER_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct VersionApi;

#[derive(Object)]
struct RespVersion
{
    version: Option<String>,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl VersionApi {
    #[oai(path = "/version", method = "get")]
    async fn get_version(&self) -> Json<RespVersion> {
        Json(RespVersion::new(SERVER_VERSION))
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespVersion {
    fn new(version: Option<&str>) -> Self {
        Self { version: version.map(|v| v.to_string()) }
    }
}
