use anyhow::{Context, Result};
use ber_codec::kerberos::KerberosStructure;
use ber_codec::{
    Config, DecodeError, DecodeMetrics, Grammar, KerberosGrammar, LdapGrammar,
    MessageHandler, NormalizingHandler, StatefulDecoder, StaticSchema,
};
use ber_codec::metrics::PduKind;
use clap::{Parser, Subcommand};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "ber-codec")]
#[command(about = "Decode BER-encoded LDAPv3 and Kerberos PDUs from a file")]
struct Args {
    /// Configuration file path (decoder limits, schema)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print decode counters in Prometheus format when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a stream of LDAPMessages
    DecodeLdap {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Input is hex text rather than raw bytes
        #[arg(long)]
        hex: bool,

        /// Feed the decoder N bytes at a time
        #[arg(long, value_name = "N")]
        chunk_size: Option<usize>,

        /// Normalize and repair SearchRequest filters against the schema
        #[arg(long)]
        normalize: bool,
    },
    /// Decode a stream of one Kerberos structure
    DecodeKerberos {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Structure to expect (Ticket, EncTicketPart, PrincipalName, ...)
        #[arg(short, long, value_name = "KIND")]
        structure: KerberosStructure,

        #[arg(long)]
        hex: bool,

        #[arg(long, value_name = "N")]
        chunk_size: Option<usize>,
    },
}

/// Prints every decoded PDU and keeps a tally.
#[derive(Default)]
struct PrintingHandler {
    decoded: usize,
    failed: usize,
}

impl<M: Debug> MessageHandler<M> for PrintingHandler {
    fn on_message_decoded(&mut self, message: M) {
        self.decoded += 1;
        println!("{:#?}", message);
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        self.failed += 1;
        warn!("PDU rejected: {}", error);
    }
}

async fn read_input(path: &Path, hex_input: bool) -> Result<Vec<u8>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading input {}", path.display()))?;
    if !hex_input {
        return Ok(raw);
    }
    let text: String = String::from_utf8(raw)
        .context("hex input is not text")?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(&text).with_context(|| format!("decoding hex from {}", path.display()))
}

async fn decode_stream<G, H>(
    decoder: &mut StatefulDecoder<G>,
    input: &[u8],
    chunk_size: Option<usize>,
    handler: &mut H,
) -> Result<()>
where
    G: Grammar,
    G::Message: PduKind,
    H: MessageHandler<G::Message>,
{
    match chunk_size {
        Some(0) => anyhow::bail!("--chunk-size must be at least 1"),
        Some(n) => {
            for chunk in input.chunks(n) {
                decoder.feed(chunk, handler)?;
            }
            decoder.finish()?;
            Ok(())
        }
        None => decoder.run(input, handler).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("ber_codec={},info", log_level))
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            info!("Configuration source: file {:?}", path);
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    info!(
        "Decoder limits: max_pdu_size={} max_depth={}",
        config.decoder.max_pdu_size, config.decoder.max_depth
    );

    let metrics = Arc::new(DecodeMetrics::new());
    let mut printer = PrintingHandler::default();

    let result = match args.command {
        Command::DecodeLdap {
            input,
            hex,
            chunk_size,
            normalize,
        } => {
            let data = read_input(&input, hex).await?;
            let mut decoder = StatefulDecoder::new(LdapGrammar::decoder(config.decoder), Arc::clone(&metrics));
            if normalize {
                let schema = if config.schema.attributes.is_empty() {
                    StaticSchema::standard()
                } else {
                    StaticSchema::from_config(&config.schema)
                };
                let mut handler = NormalizingHandler::new(&mut printer, &schema);
                decode_stream(&mut decoder, &data, chunk_size, &mut handler).await
            } else {
                decode_stream(&mut decoder, &data, chunk_size, &mut printer).await
            }
        }
        Command::DecodeKerberos {
            input,
            structure,
            hex,
            chunk_size,
        } => {
            let data = read_input(&input, hex).await?;
            let mut decoder = StatefulDecoder::new(
                KerberosGrammar::decoder(structure, config.decoder),
                Arc::clone(&metrics),
            );
            decode_stream(&mut decoder, &data, chunk_size, &mut printer).await
        }
    };

    info!("Decoded {} PDU(s), rejected {}", printer.decoded, printer.failed);
    if args.metrics {
        print!("{}", metrics.render());
    }
    if let Err(e) = &result {
        error!("Decoding stopped: {:#}", e);
    }
    result
}

