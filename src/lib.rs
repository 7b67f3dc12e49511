pub mod accumulator;
pub mod adapter;
pub mod ber;
pub mod config;
pub mod digester;
pub mod error;
pub mod filter_normalizer;
pub mod kerberos;
pub mod kerberos_encoder;
pub mod kerberos_grammar;
pub mod ldap_encoder;
pub mod ldap_grammar;
pub mod ldap_protocol;
pub mod metrics;
pub mod schema;
pub mod tlv;

pub use adapter::StatefulDecoder;
pub use config::{Config, DecoderConfig};
pub use digester::{CollectingHandler, Digester, Grammar, MessageHandler};
pub use error::{DecodeError, EncodeError, NormalizationError};
pub use filter_normalizer::{resolve_root, FilterNormalizer, NormalizingHandler};
pub use kerberos_encoder::encode_kerberos_value;
pub use kerberos_grammar::{KerberosDecoder, KerberosGrammar};
pub use ldap_encoder::encode_ldap_message;
pub use ldap_grammar::{LdapDecoder, LdapGrammar};
pub use metrics::DecodeMetrics;
pub use schema::{SchemaCapability, StaticSchema};
