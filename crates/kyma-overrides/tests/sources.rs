use std::{collections::BTreeMap, io::Write, path::PathBuf, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD};
use kyma_overrides::{
    Value,
    cluster::{ClusterTopology, StaticClusterTopology},
    defaults::{LOCAL_TLS_CRT, LOCAL_TLS_KEY, REMOTE_TLS_CRT},
    sources::{self, Error, Sources},
};
use rstest::rstest;
use tempfile::NamedTempFile;

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/testdata")
        .join(name)
}

async fn merge(sources: &Sources, topology: StaticClusterTopology) -> BTreeMap<String, Value> {
    let topology: Arc<dyn ClusterTopology> = Arc::new(topology);
    sources::merge(sources, None, topology)
        .await
        .expect("sources are valid")
}

#[tokio::test]
async fn values_with_k3d_defaults() {
    let sources = Sources {
        values: vec![
            "component.key=foo".to_owned(),
            "component.inner.key=bar".to_owned(),
        ],
        ..Sources::default()
    };

    let values = merge(&sources, StaticClusterTopology::k3d("kyma")).await;

    assert_eq!(values["component.key"], Value::from("foo"));
    assert_eq!(values["component.inner.key"], Value::from("bar"));
    assert_eq!(values["global.domainName"], Value::from("local.kyma.dev"));
    assert_eq!(values["global.ingress.domainName"], Value::from("local.kyma.dev"));
    assert_eq!(values["global.tlsCrt"], Value::from(LOCAL_TLS_CRT));
    assert_eq!(values["global.tlsKey"], Value::from(LOCAL_TLS_KEY));
    assert_eq!(
        values["serverless.dockerRegistry.serverAddress"],
        Value::from("k3d-kyma-registry:5000")
    );
    assert_eq!(
        values["serverless.dockerRegistry.enableInternal"],
        Value::Bool(false)
    );
}

#[tokio::test]
async fn remote_defaults() {
    let values = merge(&Sources::default(), StaticClusterTopology::remote()).await;

    assert_eq!(values["global.domainName"], Value::from("kyma.example.com"));
    assert_eq!(values["global.tlsCrt"], Value::from(REMOTE_TLS_CRT));
    assert!(!values.contains_key("serverless.dockerRegistry.serverAddress"));
    assert!(!values.contains_key("serverless.dockerRegistry.enableInternal"));
}

#[tokio::test]
async fn gardener_overrides_domain_and_certificate() {
    let sources = Sources {
        domain: Some("user.example.com".to_owned()),
        tls_crt_file: Some(testdata("test.crt")),
        tls_key_file: Some(testdata("test.key")),
        ..Sources::default()
    };

    let values = merge(&sources, StaticClusterTopology::gardener("shoot.ondemand.com")).await;

    assert_eq!(values["global.domainName"], Value::from("shoot.ondemand.com"));
    assert_eq!(values["global.ingress.domainName"], Value::from("shoot.ondemand.com"));
    assert_eq!(values["global.tlsCrt"], Value::from(""));
    assert_eq!(values["global.tlsKey"], Value::from(""));
}

#[rstest]
#[case::k3d(StaticClusterTopology::k3d("kyma"))]
#[case::remote(StaticClusterTopology::remote())]
#[tokio::test]
async fn provided_domain_and_certificate(#[case] topology: StaticClusterTopology) {
    let sources = Sources {
        domain: Some("user.example.com".to_owned()),
        tls_crt_file: Some(testdata("test.crt")),
        tls_key_file: Some(testdata("test.key")),
        ..Sources::default()
    };

    let values = merge(&sources, topology).await;

    let crt = std::fs::read(testdata("test.crt")).expect("test certificate exists");
    assert_eq!(values["global.domainName"], Value::from("user.example.com"));
    assert_eq!(values["global.ingress.domainName"], Value::from("user.example.com"));
    assert_eq!(values["global.tlsCrt"], Value::String(STANDARD.encode(crt)));
}

#[tokio::test]
async fn files_values_and_default_file_precedence() {
    let sources = Sources {
        values_files: vec![testdata("override.yml"), testdata("values.json")],
        values: vec!["component.replicas=7".to_owned()],
        ..Sources::default()
    };
    let default_values_file = testdata("values.yaml");
    let topology: Arc<dyn ClusterTopology> = Arc::new(StaticClusterTopology::remote());

    let values = sources::merge(&sources, Some(default_values_file.as_path()), topology)
        .await
        .expect("sources are valid");

    assert_eq!(values["component.key"], Value::from("from-override-yml"));
    assert_eq!(values["component.replicas"], Value::Integer(7));
    assert_eq!(values["component.list"], Value::Sequence(vec![Value::from("d")]));
    assert_eq!(values["global.installCRDs"], Value::Bool(true));
    assert_eq!(values["global.domainName"], Value::from("file.example.com"));
}

#[tokio::test]
async fn missing_default_file_is_skipped() {
    let default_values_file = testdata("does-not-exist.yaml");
    let topology: Arc<dyn ClusterTopology> = Arc::new(StaticClusterTopology::remote());

    let values = sources::merge(
        &Sources::default(),
        Some(default_values_file.as_path()),
        topology,
    )
    .await
    .expect("missing default file is skipped");

    assert_eq!(values["global.domainName"], Value::from("kyma.example.com"));
}

#[tokio::test]
async fn missing_values_file_fails() {
    let sources = Sources {
        values_files: vec![testdata("does-not-exist.yaml")],
        ..Sources::default()
    };

    let err = sources::collect(&sources, None)
        .await
        .expect_err("values file does not exist");

    assert!(matches!(err, Error::AddValuesFile { .. }));
}

#[tokio::test]
async fn incomplete_tls_pair_fails() {
    let sources = Sources {
        tls_crt_file: Some(testdata("test.crt")),
        ..Sources::default()
    };

    let err = sources::collect(&sources, None)
        .await
        .expect_err("private key is missing");

    assert!(matches!(err, Error::IncompleteTlsPair));
}

#[tokio::test]
async fn malformed_value_fails() {
    let sources = Sources {
        values: vec!["component.key".to_owned()],
        ..Sources::default()
    };

    let err = sources::collect(&sources, None)
        .await
        .expect_err("value has no assignment");

    assert!(matches!(err, Error::ParseValue { value, .. } if value == "component.key"));
}

#[tokio::test]
async fn unsupported_values_file_scheme_fails() {
    let sources = Sources {
        values_files: vec![PathBuf::from("ftp://example.com/values.yaml")],
        ..Sources::default()
    };

    let err = sources::collect(&sources, None)
        .await
        .expect_err("only http and https are downloaded");

    assert!(matches!(err, Error::ResolveValuesFile { .. }));
}

#[tokio::test]
async fn raw_values_mask_tls_material() {
    let sources = Sources {
        tls_crt_file: Some(testdata("test.crt")),
        tls_key_file: Some(testdata("test.key")),
        values: vec!["component.key=visible".to_owned()],
        ..Sources::default()
    };
    let mut builder = sources::collect(&sources, None)
        .await
        .expect("sources are valid");

    sources::register_masking(&mut builder);
    let raw = builder.raw().expect("sources are valid");

    let key = std::fs::read(testdata("test.key")).expect("test key exists");
    assert_eq!(raw.find("global.tlsKey"), Some(Value::String(STANDARD.encode(key))));
    assert_eq!(
        raw.to_string(),
        "{component: {key: visible}, global: {tlsCrt: <masked>, tlsKey: <masked>}}"
    );
}

#[tokio::test]
async fn mismatching_tls_files_fail() {
    let mut key = NamedTempFile::new().expect("temporary file can be created");
    key.write_all(
        &STANDARD
            .decode(LOCAL_TLS_KEY)
            .expect("built-in key is base64 encoded"),
    )
    .expect("temporary file can be written");

    let sources = Sources {
        tls_crt_file: Some(testdata("test.crt")),
        tls_key_file: Some(key.path().to_owned()),
        ..Sources::default()
    };
    let topology: Arc<dyn ClusterTopology> = Arc::new(StaticClusterTopology::remote());

    let err = sources::merge(&sources, None, topology)
        .await
        .expect_err("certificate and key don't match");

    assert!(matches!(err, Error::Build { .. }));
    assert!(
        snafu::Report::from_error(err)
            .to_string()
            .contains("private key does not match public key")
    );
}
