#![forbid(unsafe_code)]

use lazy_static::lazy_static;
use log::info;
use poem::{listener::TcpListener, Route};
use poem_openapi::OpenApiService;

// Server components
use crate::api::hello::HelloApi;
use crate::api::version::VersionApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx};
use crate::utils::errors::Errors;

// Modules
mod api;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "HelloServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the runtime context so that it has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Server --------------
    // Announce ourselves.
    println!("Starting hello_server!");

    // Initialize the server.
    hello_init();

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let base_url = format!("{}:{}",
        RUNTIME_CTX.parms.config.http_addr,
        RUNTIME_CTX.parms.config.http_port);

    // The version endpoint goes through the OpenAPI layer; the greeting
    // endpoint is a raw route so it can claim every other path and method.
    let version_service =
        OpenApiService::new(VersionApi, "Hello Server", env!("CARGO_PKG_VERSION"))
            .server(base_url);

    // The greeting handler captures its message once at startup.
    let hello = HelloApi::new(RUNTIME_CTX.parms.config.message.clone());

    // Create the routes and run the server.
    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    let app = Route::new()
        .at("/version", version_service)
        .at("/", hello.clone())
        .at("/*path", hello);

    // ------------------ Main Loop -------------------
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// hello_init:
// ---------------------------------------------------------------------------
/** Initialize all subsystems other than those needed to configure the main
 * loop processor.
 */
fn hello_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running hello_server={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("SOURCE_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
