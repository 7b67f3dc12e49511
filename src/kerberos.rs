//! Kerberos V5 structures (RFC 4120) and the set-password request (RFC 3244).
//!
//! Values are immutable once built. Decoding fills a `*Modifier` field by
//! field and calls `build()`, which fails on the first required field that
//! never arrived.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::DecodeError;

const GENERALIZED_TIME_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// Protocol version carried in every Ticket.
pub const KERBEROS_VERSION: i32 = 5;

/// KerberosTime ::= GeneralizedTime, always UTC with whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KerberosTime(DateTime<Utc>);

impl KerberosTime {
    pub fn new(time: DateTime<Utc>) -> Self {
        // sub-second precision is not representable
        let secs = time.timestamp();
        Self(DateTime::from_timestamp(secs, 0).unwrap_or(time))
    }

    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        if text.len() != 15 || !text.ends_with('Z') {
            return Err(DecodeError::constraint(
                "KerberosTime",
                "value",
                format!("expected YYYYMMDDHHMMSSZ, got '{}'", text),
            ));
        }
        let naive = NaiveDateTime::parse_from_str(text, GENERALIZED_TIME_FORMAT)
            .map_err(|e| DecodeError::constraint("KerberosTime", "value", e.to_string()))?;
        Ok(Self(naive.and_utc()))
    }

    pub fn to_generalized_time(&self) -> String {
        self.0.format(GENERALIZED_TIME_FORMAT).to_string()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for KerberosTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_generalized_time())
    }
}

/// TicketFlags ::= KerberosFlags, a 32-bit BIT STRING. Bit 0 is the most
/// significant bit of the first octet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketFlags(u32);

impl TicketFlags {
    pub const RESERVED: u32 = 0;
    pub const FORWARDABLE: u32 = 1;
    pub const FORWARDED: u32 = 2;
    pub const PROXIABLE: u32 = 3;
    pub const PROXY: u32 = 4;
    pub const MAY_POSTDATE: u32 = 5;
    pub const POSTDATED: u32 = 6;
    pub const INVALID: u32 = 7;
    pub const RENEWABLE: u32 = 8;
    pub const INITIAL: u32 = 9;
    pub const PRE_AUTHENT: u32 = 10;
    pub const HW_AUTHENT: u32 = 11;
    pub const TRANSITED_POLICY_CHECKED: u32 = 12;
    pub const OK_AS_DELEGATE: u32 = 13;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_set(&self, flag: u32) -> bool {
        flag < 32 && self.0 & (0x8000_0000 >> flag) != 0
    }

    pub fn set(&mut self, flag: u32) {
        if flag < 32 {
            self.0 |= 0x8000_0000 >> flag;
        }
    }

    pub fn with(mut self, flag: u32) -> Self {
        self.set(flag);
        self
    }

    /// Parse BIT STRING content octets (unused-bit count, then the bits).
    pub fn from_bit_string(content: &[u8]) -> Result<Self, DecodeError> {
        let Some((&unused, bits)) = content.split_first() else {
            return Err(DecodeError::constraint("TicketFlags", "value", "empty BIT STRING"));
        };
        if unused > 7 || (bits.is_empty() && unused != 0) {
            return Err(DecodeError::constraint(
                "TicketFlags",
                "value",
                format!("invalid unused bit count {}", unused),
            ));
        }
        if bits.len() > 4 {
            return Err(DecodeError::constraint(
                "TicketFlags",
                "value",
                format!("{} flag octets exceed 32 bits", bits.len()),
            ));
        }
        let mut value = 0u32;
        for (i, b) in bits.iter().enumerate() {
            value |= (*b as u32) << (24 - 8 * i);
        }
        Ok(Self(value))
    }

    /// DER content octets: no unused bits, four flag octets.
    pub fn to_bit_string(&self) -> [u8; 5] {
        let b = self.0.to_be_bytes();
        [0, b[0], b[1], b[2], b[3]]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalName {
    pub name_type: i32,
    pub name_string: Vec<String>,
}

impl PrincipalName {
    pub fn new(name_type: i32, components: &[&str]) -> Self {
        Self {
            name_type,
            name_string: components.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl fmt::Display for PrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name_string.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    pub key_type: i32,
    pub key_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub cksum_type: i32,
    pub checksum: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub etype: i32,
    pub kvno: Option<u32>,
    pub cipher: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitedEncoding {
    pub tr_type: i32,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub addr_type: i32,
    pub address: Vec<u8>,
}

pub type HostAddresses = Vec<HostAddress>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDataEntry {
    pub ad_type: i32,
    pub ad_data: Vec<u8>,
}

pub type AuthorizationData = Vec<AuthorizationDataEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastReqEntry {
    pub lr_type: i32,
    pub lr_value: KerberosTime,
}

pub type LastReq = Vec<LastReqEntry>;

/// Ticket ::= [APPLICATION 1] SEQUENCE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub tkt_vno: i32,
    pub realm: String,
    pub sname: PrincipalName,
    pub enc_part: EncryptedData,
}

/// EncTicketPart ::= [APPLICATION 3] SEQUENCE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncTicketPart {
    pub flags: TicketFlags,
    pub key: EncryptionKey,
    pub crealm: String,
    pub cname: PrincipalName,
    pub transited: TransitedEncoding,
    pub auth_time: KerberosTime,
    pub start_time: Option<KerberosTime>,
    pub end_time: KerberosTime,
    pub renew_till: Option<KerberosTime>,
    pub caddr: Option<HostAddresses>,
    pub authorization_data: Option<AuthorizationData>,
}

/// ChangePasswdData from RFC 3244.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePasswdData {
    pub new_passwd: Vec<u8>,
    pub targ_name: Option<PrincipalName>,
    pub targ_realm: Option<String>,
}

/// Structures a Kerberos decoder can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KerberosStructure {
    PrincipalName,
    EncryptionKey,
    Checksum,
    EncryptedData,
    TransitedEncoding,
    HostAddress,
    HostAddresses,
    AuthorizationData,
    AuthorizationDataEntry,
    LastReq,
    LastReqEntry,
    Ticket,
    EncTicketPart,
    ChangePasswdData,
}

impl KerberosStructure {
    pub const ALL: [KerberosStructure; 14] = [
        KerberosStructure::PrincipalName,
        KerberosStructure::EncryptionKey,
        KerberosStructure::Checksum,
        KerberosStructure::EncryptedData,
        KerberosStructure::TransitedEncoding,
        KerberosStructure::HostAddress,
        KerberosStructure::HostAddresses,
        KerberosStructure::AuthorizationData,
        KerberosStructure::AuthorizationDataEntry,
        KerberosStructure::LastReq,
        KerberosStructure::LastReqEntry,
        KerberosStructure::Ticket,
        KerberosStructure::EncTicketPart,
        KerberosStructure::ChangePasswdData,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KerberosStructure::PrincipalName => "PrincipalName",
            KerberosStructure::EncryptionKey => "EncryptionKey",
            KerberosStructure::Checksum => "Checksum",
            KerberosStructure::EncryptedData => "EncryptedData",
            KerberosStructure::TransitedEncoding => "TransitedEncoding",
            KerberosStructure::HostAddress => "HostAddress",
            KerberosStructure::HostAddresses => "HostAddresses",
            KerberosStructure::AuthorizationData => "AuthorizationData",
            KerberosStructure::AuthorizationDataEntry => "AuthorizationDataEntry",
            KerberosStructure::LastReq => "LastReq",
            KerberosStructure::LastReqEntry => "LastReqEntry",
            KerberosStructure::Ticket => "Ticket",
            KerberosStructure::EncTicketPart => "EncTicketPart",
            KerberosStructure::ChangePasswdData => "ChangePasswdData",
        }
    }

    /// SEQUENCE OF structures.
    pub fn element(self) -> Option<KerberosStructure> {
        match self {
            KerberosStructure::HostAddresses => Some(KerberosStructure::HostAddress),
            KerberosStructure::AuthorizationData => Some(KerberosStructure::AuthorizationDataEntry),
            KerberosStructure::LastReq => Some(KerberosStructure::LastReqEntry),
            _ => None,
        }
    }

    /// APPLICATION tag number wrapping the SEQUENCE, if any.
    pub fn application_tag(self) -> Option<u32> {
        match self {
            KerberosStructure::Ticket => Some(1),
            KerberosStructure::EncTicketPart => Some(3),
            _ => None,
        }
    }
}

impl FromStr for KerberosStructure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KerberosStructure::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = KerberosStructure::ALL.iter().map(|k| k.name()).collect();
                format!("unknown structure '{}', expected one of {}", s, names.join(", "))
            })
    }
}

impl fmt::Display for KerberosStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any decodable Kerberos value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KerberosValue {
    PrincipalName(PrincipalName),
    EncryptionKey(EncryptionKey),
    Checksum(Checksum),
    EncryptedData(EncryptedData),
    TransitedEncoding(TransitedEncoding),
    HostAddress(HostAddress),
    HostAddresses(HostAddresses),
    AuthorizationData(AuthorizationData),
    AuthorizationDataEntry(AuthorizationDataEntry),
    LastReq(LastReq),
    LastReqEntry(LastReqEntry),
    Ticket(Ticket),
    EncTicketPart(EncTicketPart),
    ChangePasswdData(ChangePasswdData),
}

impl KerberosValue {
    pub fn structure(&self) -> KerberosStructure {
        match self {
            KerberosValue::PrincipalName(_) => KerberosStructure::PrincipalName,
            KerberosValue::EncryptionKey(_) => KerberosStructure::EncryptionKey,
            KerberosValue::Checksum(_) => KerberosStructure::Checksum,
            KerberosValue::EncryptedData(_) => KerberosStructure::EncryptedData,
            KerberosValue::TransitedEncoding(_) => KerberosStructure::TransitedEncoding,
            KerberosValue::HostAddress(_) => KerberosStructure::HostAddress,
            KerberosValue::HostAddresses(_) => KerberosStructure::HostAddresses,
            KerberosValue::AuthorizationData(_) => KerberosStructure::AuthorizationData,
            KerberosValue::AuthorizationDataEntry(_) => KerberosStructure::AuthorizationDataEntry,
            KerberosValue::LastReq(_) => KerberosStructure::LastReq,
            KerberosValue::LastReqEntry(_) => KerberosStructure::LastReqEntry,
            KerberosValue::Ticket(_) => KerberosStructure::Ticket,
            KerberosValue::EncTicketPart(_) => KerberosStructure::EncTicketPart,
            KerberosValue::ChangePasswdData(_) => KerberosStructure::ChangePasswdData,
        }
    }
}

fn required<T>(slot: Option<T>, structure: &'static str, field: &'static str) -> Result<T, DecodeError> {
    slot.ok_or_else(|| DecodeError::missing(structure, field))
}

#[derive(Debug, Clone, Default)]
pub struct PrincipalNameModifier {
    name_type: Option<i32>,
    name_string: Vec<String>,
}

impl PrincipalNameModifier {
    pub fn set_name_type(&mut self, name_type: i32) {
        self.name_type = Some(name_type);
    }

    /// Components keep arrival order.
    pub fn add_name(&mut self, component: String) {
        self.name_string.push(component);
    }

    pub fn build(self) -> Result<PrincipalName, DecodeError> {
        Ok(PrincipalName {
            name_type: required(self.name_type, "PrincipalName", "name-type")?,
            name_string: self.name_string,
        })
    }
}

/// Modifier for the two-field `{type [0] Int32, data [1] OCTET STRING}`
/// shape shared by several structures.
#[derive(Debug, Clone, Default)]
pub struct TypedDataModifier {
    data_type: Option<i32>,
    data: Option<Vec<u8>>,
}

impl TypedDataModifier {
    pub fn set_type(&mut self, data_type: i32) {
        self.data_type = Some(data_type);
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
    }

    fn parts(
        self,
        structure: &'static str,
        type_field: &'static str,
        data_field: &'static str,
    ) -> Result<(i32, Vec<u8>), DecodeError> {
        Ok((
            required(self.data_type, structure, type_field)?,
            required(self.data, structure, data_field)?,
        ))
    }

    pub fn build_encryption_key(self) -> Result<EncryptionKey, DecodeError> {
        let (key_type, key_value) = self.parts("EncryptionKey", "keytype", "keyvalue")?;
        Ok(EncryptionKey { key_type, key_value })
    }

    pub fn build_checksum(self) -> Result<Checksum, DecodeError> {
        let (cksum_type, checksum) = self.parts("Checksum", "cksumtype", "checksum")?;
        Ok(Checksum { cksum_type, checksum })
    }

    pub fn build_transited(self) -> Result<TransitedEncoding, DecodeError> {
        let (tr_type, contents) = self.parts("TransitedEncoding", "tr-type", "contents")?;
        Ok(TransitedEncoding { tr_type, contents })
    }

    pub fn build_host_address(self) -> Result<HostAddress, DecodeError> {
        let (addr_type, address) = self.parts("HostAddress", "addr-type", "address")?;
        Ok(HostAddress { addr_type, address })
    }

    pub fn build_authorization_entry(self) -> Result<AuthorizationDataEntry, DecodeError> {
        let (ad_type, ad_data) = self.parts("AuthorizationData", "ad-type", "ad-data")?;
        Ok(AuthorizationDataEntry { ad_type, ad_data })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncryptedDataModifier {
    etype: Option<i32>,
    kvno: Option<u32>,
    cipher: Option<Vec<u8>>,
}

impl EncryptedDataModifier {
    pub fn set_etype(&mut self, etype: i32) {
        self.etype = Some(etype);
    }

    pub fn set_kvno(&mut self, kvno: u32) {
        self.kvno = Some(kvno);
    }

    pub fn set_cipher(&mut self, cipher: Vec<u8>) {
        self.cipher = Some(cipher);
    }

    pub fn build(self) -> Result<EncryptedData, DecodeError> {
        Ok(EncryptedData {
            etype: required(self.etype, "EncryptedData", "etype")?,
            kvno: self.kvno,
            cipher: required(self.cipher, "EncryptedData", "cipher")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LastReqEntryModifier {
    lr_type: Option<i32>,
    lr_value: Option<KerberosTime>,
}

impl LastReqEntryModifier {
    pub fn set_lr_type(&mut self, lr_type: i32) {
        self.lr_type = Some(lr_type);
    }

    pub fn set_lr_value(&mut self, lr_value: KerberosTime) {
        self.lr_value = Some(lr_value);
    }

    pub fn build(self) -> Result<LastReqEntry, DecodeError> {
        Ok(LastReqEntry {
            lr_type: required(self.lr_type, "LastReq", "lr-type")?,
            lr_value: required(self.lr_value, "LastReq", "lr-value")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketModifier {
    tkt_vno: Option<i32>,
    realm: Option<String>,
    sname: Option<PrincipalName>,
    enc_part: Option<EncryptedData>,
}

impl TicketModifier {
    pub fn set_tkt_vno(&mut self, tkt_vno: i32) -> Result<(), DecodeError> {
        if tkt_vno != KERBEROS_VERSION {
            return Err(DecodeError::constraint(
                "Ticket",
                "tkt-vno",
                format!("unsupported version {}", tkt_vno),
            ));
        }
        self.tkt_vno = Some(tkt_vno);
        Ok(())
    }

    pub fn set_realm(&mut self, realm: String) {
        self.realm = Some(realm);
    }

    pub fn set_sname(&mut self, sname: PrincipalName) {
        self.sname = Some(sname);
    }

    pub fn set_enc_part(&mut self, enc_part: EncryptedData) {
        self.enc_part = Some(enc_part);
    }

    pub fn build(self) -> Result<Ticket, DecodeError> {
        Ok(Ticket {
            tkt_vno: required(self.tkt_vno, "Ticket", "tkt-vno")?,
            realm: required(self.realm, "Ticket", "realm")?,
            sname: required(self.sname, "Ticket", "sname")?,
            enc_part: required(self.enc_part, "Ticket", "enc-part")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncTicketPartModifier {
    pub flags: Option<TicketFlags>,
    pub key: Option<EncryptionKey>,
    pub crealm: Option<String>,
    pub cname: Option<PrincipalName>,
    pub transited: Option<TransitedEncoding>,
    pub auth_time: Option<KerberosTime>,
    pub start_time: Option<KerberosTime>,
    pub end_time: Option<KerberosTime>,
    pub renew_till: Option<KerberosTime>,
    pub caddr: Option<HostAddresses>,
    pub authorization_data: Option<AuthorizationData>,
}

impl EncTicketPartModifier {
    pub fn build(self) -> Result<EncTicketPart, DecodeError> {
        const S: &str = "EncTicketPart";
        Ok(EncTicketPart {
            flags: required(self.flags, S, "flags")?,
            key: required(self.key, S, "key")?,
            crealm: required(self.crealm, S, "crealm")?,
            cname: required(self.cname, S, "cname")?,
            transited: required(self.transited, S, "transited")?,
            auth_time: required(self.auth_time, S, "authtime")?,
            start_time: self.start_time,
            end_time: required(self.end_time, S, "endtime")?,
            renew_till: self.renew_till,
            caddr: self.caddr,
            authorization_data: self.authorization_data,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangePasswdDataModifier {
    pub new_passwd: Option<Vec<u8>>,
    pub targ_name: Option<PrincipalName>,
    pub targ_realm: Option<String>,
}

impl ChangePasswdDataModifier {
    pub fn build(self) -> Result<ChangePasswdData, DecodeError> {
        Ok(ChangePasswdData {
            new_passwd: required(self.new_passwd, "ChangePasswdData", "newpasswd")?,
            targ_name: self.targ_name,
            targ_realm: self.targ_realm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kerberos_time_round_trip() {
        let time = KerberosTime::parse("20240315093000Z").unwrap();
        assert_eq!(
            time.as_datetime(),
            Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
        );
        assert_eq!(time.to_generalized_time(), "20240315093000Z");
    }

    #[test]
    fn test_kerberos_time_rejects_fractions_and_offsets() {
        assert!(KerberosTime::parse("20240315093000.5Z").is_err());
        assert!(KerberosTime::parse("20240315093000+0100").is_err());
        assert!(KerberosTime::parse("2024031509300Z").is_err());
        assert!(KerberosTime::parse("20241315093000Z").is_err());
    }

    #[test]
    fn test_kerberos_time_drops_subseconds() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::milliseconds(250);
        assert_eq!(KerberosTime::new(dt).to_generalized_time(), "20240102030405Z");
    }

    #[test]
    fn test_ticket_flags_bits() {
        let flags = TicketFlags::default()
            .with(TicketFlags::FORWARDABLE)
            .with(TicketFlags::RENEWABLE)
            .with(TicketFlags::PRE_AUTHENT);
        assert!(flags.is_set(TicketFlags::FORWARDABLE));
        assert!(!flags.is_set(TicketFlags::PROXY));
        assert_eq!(flags.to_bit_string(), [0x00, 0x40, 0xA0, 0x00, 0x00]);
        assert_eq!(TicketFlags::from_bit_string(&flags.to_bit_string()).unwrap(), flags);
    }

    #[test]
    fn test_ticket_flags_short_and_invalid() {
        // shorter encodings fill from the top
        assert_eq!(TicketFlags::from_bit_string(&[0x00, 0x40]).unwrap().bits(), 0x4000_0000);
        assert!(TicketFlags::from_bit_string(&[]).is_err());
        assert!(TicketFlags::from_bit_string(&[0x08, 0x00]).is_err());
        assert!(TicketFlags::from_bit_string(&[0x00, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_modifier_reports_first_missing_field() {
        let mut modifier = TicketModifier::default();
        modifier.set_tkt_vno(5).unwrap();
        modifier.set_realm("EXAMPLE.COM".to_string());
        match modifier.build() {
            Err(DecodeError::DomainConstraintViolation { structure, field, .. }) => {
                assert_eq!(structure, "Ticket");
                assert_eq!(field, "sname");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ticket_version_checked() {
        let mut modifier = TicketModifier::default();
        assert!(modifier.set_tkt_vno(4).is_err());
    }

    #[test]
    fn test_optional_fields_stay_absent() {
        let mut modifier = EncryptedDataModifier::default();
        modifier.set_etype(18);
        modifier.set_cipher(vec![1, 2, 3]);
        let data = modifier.build().unwrap();
        assert_eq!(data.kvno, None);

        let mut modifier = ChangePasswdDataModifier::default();
        modifier.new_passwd = Some(b"secret".to_vec());
        let data = modifier.build().unwrap();
        assert!(data.targ_name.is_none() && data.targ_realm.is_none());
    }

    #[test]
    fn test_structure_from_str() {
        assert_eq!("ticket".parse::<KerberosStructure>().unwrap(), KerberosStructure::Ticket);
        assert_eq!(
            "EncTicketPart".parse::<KerberosStructure>().unwrap(),
            KerberosStructure::EncTicketPart
        );
        assert!("AS-REQ".parse::<KerberosStructure>().is_err());
    }
}
