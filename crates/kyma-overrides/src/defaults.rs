//! Built-in defaults injected by the interceptors when the user didn't
//! provide a value.

/// Domain of local k3d clusters.
pub const LOCAL_KYMA_DOMAIN: &str = "local.kyma.dev";

/// Domain of remote clusters which are not managed by Gardener.
pub const REMOTE_KYMA_DOMAIN: &str = "kyma.example.com";

/// Base64 encoded self-signed certificate for `*.local.kyma.dev`.
pub const LOCAL_TLS_CRT: &str = include_str!("../certs/local.crt.b64");

/// Base64 encoded private key of [`LOCAL_TLS_CRT`].
pub const LOCAL_TLS_KEY: &str = include_str!("../certs/local.key.b64");

/// Base64 encoded self-signed certificate for `*.kyma.example.com`.
pub const REMOTE_TLS_CRT: &str = include_str!("../certs/remote.crt.b64");

/// Base64 encoded private key of [`REMOTE_TLS_CRT`].
pub const REMOTE_TLS_KEY: &str = include_str!("../certs/remote.key.b64");

/// Override key holding the base64 encoded TLS certificate.
pub const TLS_CRT_KEY: &str = "global.tlsCrt";

/// Override key holding the base64 encoded TLS private key.
pub const TLS_KEY_KEY: &str = "global.tlsKey";

pub const DOMAIN_NAME_KEYS: [&str; 2] = ["global.domainName", "global.ingress.domainName"];

pub const REGISTRY_ADDRESS_KEYS: [&str; 3] = [
    "serverless.dockerRegistry.internalServerAddress",
    "serverless.dockerRegistry.serverAddress",
    "serverless.dockerRegistry.registryAddress",
];

pub const REGISTRY_ENABLE_INTERNAL_KEY: &str = "serverless.dockerRegistry.enableInternal";
