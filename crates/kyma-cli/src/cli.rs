use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use kyma_overrides::{
    Overrides, builder,
    cluster::KubeClusterTopology,
    sources::{self, Sources},
};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to collect value sources"))]
    CollectSources { source: sources::Error },

    #[snafu(display("failed to merge values"))]
    Merge { source: builder::Error },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to build values"))]
    Build { source: builder::Error },

    #[snafu(display("failed to serialize values as YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to serialize values as JSON"))]
    SerializeJson { source: serde_json::Error },

    #[snafu(display("failed to write values to stdout"))]
    WriteOutput { source: io::Error },
}

#[derive(Debug, Parser)]
#[command(name = "kyma", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge all value sources, default them for the current cluster and
    /// print the result.
    Values(ValuesArguments),
}

#[derive(Debug, Args)]
pub struct ValuesArguments {
    #[command(flatten)]
    pub sources: Sources,

    /// Values file merged before all other sources. Skipped if it doesn't
    /// exist.
    #[arg(long, env = "KYMA_DEFAULT_VALUES_FILE", value_name = "FILE")]
    pub default_values_file: Option<PathBuf>,

    /// Only merge the sources, without contacting the cluster.
    #[arg(long, env = "KYMA_RAW")]
    pub raw: bool,

    /// Format of the printed values.
    #[arg(long, short, value_enum, env = "KYMA_OUTPUT", default_value_t)]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// One `key=value` line per value.
    #[default]
    Flat,
    Yaml,
    Json,
}

impl ValuesArguments {
    #[instrument(skip(self), fields(raw = self.raw, output = %self.output))]
    pub async fn run(self) -> Result<(), Error> {
        let mut builder = sources::collect(&self.sources, self.default_values_file.as_deref())
            .await
            .context(CollectSourcesSnafu)?;

        let overrides = if self.raw {
            sources::register_masking(&mut builder);
            builder.raw().context(MergeSnafu)?
        } else {
            let client = kube::Client::try_default()
                .await
                .context(CreateClientSnafu)?;
            sources::register_interceptors(
                &mut builder,
                Arc::new(KubeClusterTopology::new(client)),
            );
            builder.build().await.context(BuildSnafu)?
        };

        tracing::info!(%overrides, "merged values");
        print(&overrides, self.output, &mut io::stdout().lock())
    }
}

fn print(overrides: &Overrides, format: OutputFormat, out: &mut impl Write) -> Result<(), Error> {
    match format {
        OutputFormat::Flat => {
            for (key, value) in overrides.flattened_map() {
                writeln!(out, "{key}={value}").context(WriteOutputSnafu)?;
            }
        }
        OutputFormat::Yaml => {
            serde_yaml::to_writer(&mut *out, &overrides.map()).context(SerializeYamlSnafu)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &overrides.map())
                .context(SerializeJsonSnafu)?;
            writeln!(out).context(WriteOutputSnafu)?;
        }
    }

    out.flush().context(WriteOutputSnafu)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use kyma_overrides::{Builder, Mapping};
    use rstest::rstest;

    use super::*;

    fn overrides() -> Overrides {
        let values: Mapping = serde_yaml::from_str("chart: {enabled: true, name: kyma, list: [a, b]}")
            .expect("test YAML is valid");
        let mut builder = Builder::new();
        builder.add_values(values).expect("values are not empty");
        builder.raw().expect("values are valid")
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_values_arguments() {
        let cli = Cli::try_parse_from([
            "kyma",
            "values",
            "--values-file",
            "a.yaml",
            "--values-file",
            "b.json",
            "--value",
            "a.b=c,d=e",
            "--domain",
            "example.com",
            "--raw",
            "--output",
            "json",
        ])
        .expect("arguments are valid");

        let Command::Values(arguments) = cli.command;
        assert_eq!(
            arguments.sources.values_files,
            [PathBuf::from("a.yaml"), PathBuf::from("b.json")]
        );
        assert_eq!(arguments.sources.values, ["a.b=c,d=e"]);
        assert_eq!(arguments.sources.domain.as_deref(), Some("example.com"));
        assert!(arguments.raw);
        assert_eq!(arguments.output, OutputFormat::Json);
    }

    #[test]
    fn values_file_paths_keep_commas() {
        let cli = Cli::try_parse_from(["kyma", "values", "--values-file", "a,b.yaml"])
            .expect("arguments are valid");

        let Command::Values(arguments) = cli.command;
        assert_eq!(arguments.sources.values_files, [PathBuf::from("a,b.yaml")]);
    }

    #[test]
    fn tls_files_are_required_together() {
        let result = Cli::try_parse_from(["kyma", "values", "--tls-crt", "tls.crt"]);

        assert!(result.is_err());
    }

    #[rstest]
    #[case(OutputFormat::Flat, "chart.enabled=true\nchart.list=[a, b]\nchart.name=kyma\n")]
    #[case(OutputFormat::Yaml, "chart:\n  enabled: true\n  list:\n  - a\n  - b\n  name: kyma\n")]
    fn print_formats(#[case] format: OutputFormat, #[case] expected: &str) {
        let mut out = Vec::new();

        print(&overrides(), format, &mut out).expect("writing to a vector never fails");

        assert_eq!(String::from_utf8(out).expect("output is UTF-8"), expected);
    }

    #[test]
    fn print_json() {
        let mut out = Vec::new();

        print(&overrides(), OutputFormat::Json, &mut out).expect("writing to a vector never fails");

        let printed: serde_json::Value =
            serde_json::from_slice(&out).expect("output is valid JSON");
        assert_eq!(printed["chart"]["list"][1], "b");
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
