//! Kerberos grammar for the [`Digester`](crate::digester::Digester).
//!
//! Every SEQUENCE field is wrapped in an explicit context tag `[n]`. A
//! sequence frame's state is one past the last field seen, so a field whose
//! number is below the state is out of order and has no rule.

use bytes::Bytes;
use tracing::debug;

use crate::ber::{i32_field, integer_field, utf8_field};
use crate::config::DecoderConfig;
use crate::digester::{Digester, Grammar, ObjectStack, Transition};
use crate::error::DecodeError;
use crate::kerberos::*;
use crate::tlv::Tag;

pub type KerberosDecoder = Digester<KerberosGrammar>;

/// Grammar for one expected top-level structure.
#[derive(Debug, Clone, Copy)]
pub struct KerberosGrammar {
    structure: KerberosStructure,
}

impl KerberosGrammar {
    pub fn new(structure: KerberosStructure) -> Self {
        Self { structure }
    }

    pub fn decoder(structure: KerberosStructure, config: DecoderConfig) -> KerberosDecoder {
        Digester::with_config(Self::new(structure), config)
    }

    pub fn structure(&self) -> KerberosStructure {
        self.structure
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KerberosRule {
    /// `[APPLICATION n]` around the structure's SEQUENCE.
    Application(KerberosStructure),
    Sequence(KerberosStructure),
    SequenceOf(KerberosStructure),
    /// Explicit `[n]` wrapper of a SEQUENCE field.
    Explicit(KerberosStructure, u8),
    /// Primitive content of field `n`.
    Value(KerberosStructure, u8),
    /// PrincipalName name-string: SEQUENCE OF KerberosString.
    NameStrings,
    NameString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Int32,
    UInt32,
    KerberosString,
    Octets,
    Time,
    Flags,
    NameStrings,
    Nested(KerberosStructure),
}

/// Field `n` of structure `s`: its ASN.1 name and content type.
fn field_def(s: KerberosStructure, n: u8) -> Option<(&'static str, FieldType)> {
    use FieldType::*;
    use KerberosStructure as K;
    Some(match (s, n) {
        (K::PrincipalName, 0) => ("name-type", Int32),
        (K::PrincipalName, 1) => ("name-string", NameStrings),
        (K::EncryptionKey, 0) => ("keytype", Int32),
        (K::EncryptionKey, 1) => ("keyvalue", Octets),
        (K::Checksum, 0) => ("cksumtype", Int32),
        (K::Checksum, 1) => ("checksum", Octets),
        (K::EncryptedData, 0) => ("etype", Int32),
        (K::EncryptedData, 1) => ("kvno", UInt32),
        (K::EncryptedData, 2) => ("cipher", Octets),
        (K::TransitedEncoding, 0) => ("tr-type", Int32),
        (K::TransitedEncoding, 1) => ("contents", Octets),
        (K::HostAddress, 0) => ("addr-type", Int32),
        (K::HostAddress, 1) => ("address", Octets),
        (K::AuthorizationDataEntry, 0) => ("ad-type", Int32),
        (K::AuthorizationDataEntry, 1) => ("ad-data", Octets),
        (K::LastReqEntry, 0) => ("lr-type", Int32),
        (K::LastReqEntry, 1) => ("lr-value", Time),
        (K::Ticket, 0) => ("tkt-vno", Int32),
        (K::Ticket, 1) => ("realm", KerberosString),
        (K::Ticket, 2) => ("sname", Nested(K::PrincipalName)),
        (K::Ticket, 3) => ("enc-part", Nested(K::EncryptedData)),
        (K::EncTicketPart, 0) => ("flags", Flags),
        (K::EncTicketPart, 1) => ("key", Nested(K::EncryptionKey)),
        (K::EncTicketPart, 2) => ("crealm", KerberosString),
        (K::EncTicketPart, 3) => ("cname", Nested(K::PrincipalName)),
        (K::EncTicketPart, 4) => ("transited", Nested(K::TransitedEncoding)),
        (K::EncTicketPart, 5) => ("authtime", Time),
        (K::EncTicketPart, 6) => ("starttime", Time),
        (K::EncTicketPart, 7) => ("endtime", Time),
        (K::EncTicketPart, 8) => ("renew-till", Time),
        (K::EncTicketPart, 9) => ("caddr", Nested(K::HostAddresses)),
        (K::EncTicketPart, 10) => ("authorization-data", Nested(K::AuthorizationData)),
        (K::ChangePasswdData, 0) => ("newpasswd", Octets),
        (K::ChangePasswdData, 1) => ("targname", Nested(K::PrincipalName)),
        (K::ChangePasswdData, 2) => ("targrealm", KerberosString),
        _ => return None,
    })
}

/// Outer tag and rule of a structure, wherever it appears.
fn structure_rule(s: KerberosStructure) -> (Tag, KerberosRule) {
    if let Some(number) = s.application_tag() {
        (Tag::application(number), KerberosRule::Application(s))
    } else if s.element().is_some() {
        (Tag::SEQUENCE, KerberosRule::SequenceOf(s))
    } else {
        (Tag::SEQUENCE, KerberosRule::Sequence(s))
    }
}

fn field_rule(s: KerberosStructure, n: u8, field_type: FieldType) -> (Tag, KerberosRule) {
    let primitive = |tag| (tag, KerberosRule::Value(s, n));
    match field_type {
        FieldType::Int32 | FieldType::UInt32 => primitive(Tag::INTEGER),
        FieldType::KerberosString => primitive(Tag::GENERAL_STRING),
        FieldType::Octets => primitive(Tag::OCTET_STRING),
        FieldType::Time => primitive(Tag::GENERALIZED_TIME),
        FieldType::Flags => primitive(Tag::BIT_STRING),
        FieldType::NameStrings => (Tag::SEQUENCE, KerberosRule::NameStrings),
        FieldType::Nested(inner) => structure_rule(inner),
    }
}

/// Decoded field content on its way into a modifier.
#[derive(Debug)]
enum FieldValue {
    Int(i32),
    UInt(u32),
    Str(String),
    Octets(Vec<u8>),
    Time(KerberosTime),
    Flags(TicketFlags),
    Nested(KerberosValue),
}

#[derive(Debug)]
pub enum Modifier {
    PrincipalName(PrincipalNameModifier),
    TypedData(KerberosStructure, TypedDataModifier),
    EncryptedData(EncryptedDataModifier),
    LastReqEntry(LastReqEntryModifier),
    Ticket(TicketModifier),
    EncTicketPart(EncTicketPartModifier),
    ChangePasswdData(ChangePasswdDataModifier),
}

impl Modifier {
    fn new(s: KerberosStructure) -> Result<Self, DecodeError> {
        use KerberosStructure as K;
        Ok(match s {
            K::PrincipalName => Modifier::PrincipalName(PrincipalNameModifier::default()),
            K::EncryptionKey | K::Checksum | K::TransitedEncoding | K::HostAddress | K::AuthorizationDataEntry => {
                Modifier::TypedData(s, TypedDataModifier::default())
            }
            K::EncryptedData => Modifier::EncryptedData(EncryptedDataModifier::default()),
            K::LastReqEntry => Modifier::LastReqEntry(LastReqEntryModifier::default()),
            K::Ticket => Modifier::Ticket(TicketModifier::default()),
            K::EncTicketPart => Modifier::EncTicketPart(EncTicketPartModifier::default()),
            K::ChangePasswdData => Modifier::ChangePasswdData(ChangePasswdDataModifier::default()),
            K::HostAddresses | K::AuthorizationData | K::LastReq => return Err(stack_error(s.name())),
        })
    }

    fn set(&mut self, structure: KerberosStructure, n: u8, value: FieldValue) -> Result<(), DecodeError> {
        use FieldValue as F;
        use KerberosValue as V;
        match (self, n, value) {
            (Modifier::PrincipalName(m), 0, F::Int(t)) => m.set_name_type(t),
            (Modifier::TypedData(_, m), 0, F::Int(t)) => m.set_type(t),
            (Modifier::TypedData(_, m), 1, F::Octets(d)) => m.set_data(d),
            (Modifier::EncryptedData(m), 0, F::Int(t)) => m.set_etype(t),
            (Modifier::EncryptedData(m), 1, F::UInt(k)) => m.set_kvno(k),
            (Modifier::EncryptedData(m), 2, F::Octets(c)) => m.set_cipher(c),
            (Modifier::LastReqEntry(m), 0, F::Int(t)) => m.set_lr_type(t),
            (Modifier::LastReqEntry(m), 1, F::Time(t)) => m.set_lr_value(t),
            (Modifier::Ticket(m), 0, F::Int(v)) => m.set_tkt_vno(v)?,
            (Modifier::Ticket(m), 1, F::Str(r)) => m.set_realm(r),
            (Modifier::Ticket(m), 2, F::Nested(V::PrincipalName(p))) => m.set_sname(p),
            (Modifier::Ticket(m), 3, F::Nested(V::EncryptedData(e))) => m.set_enc_part(e),
            (Modifier::EncTicketPart(m), 0, F::Flags(f)) => m.flags = Some(f),
            (Modifier::EncTicketPart(m), 1, F::Nested(V::EncryptionKey(k))) => m.key = Some(k),
            (Modifier::EncTicketPart(m), 2, F::Str(r)) => m.crealm = Some(r),
            (Modifier::EncTicketPart(m), 3, F::Nested(V::PrincipalName(p))) => m.cname = Some(p),
            (Modifier::EncTicketPart(m), 4, F::Nested(V::TransitedEncoding(t))) => m.transited = Some(t),
            (Modifier::EncTicketPart(m), 5, F::Time(t)) => m.auth_time = Some(t),
            (Modifier::EncTicketPart(m), 6, F::Time(t)) => m.start_time = Some(t),
            (Modifier::EncTicketPart(m), 7, F::Time(t)) => m.end_time = Some(t),
            (Modifier::EncTicketPart(m), 8, F::Time(t)) => m.renew_till = Some(t),
            (Modifier::EncTicketPart(m), 9, F::Nested(V::HostAddresses(a))) => m.caddr = Some(a),
            (Modifier::EncTicketPart(m), 10, F::Nested(V::AuthorizationData(a))) => {
                m.authorization_data = Some(a)
            }
            (Modifier::ChangePasswdData(m), 0, F::Octets(p)) => m.new_passwd = Some(p),
            (Modifier::ChangePasswdData(m), 1, F::Nested(V::PrincipalName(p))) => m.targ_name = Some(p),
            (Modifier::ChangePasswdData(m), 2, F::Str(r)) => m.targ_realm = Some(r),
            _ => return Err(stack_error(structure.name())),
        }
        Ok(())
    }

    fn build(self) -> Result<KerberosValue, DecodeError> {
        use KerberosStructure as K;
        Ok(match self {
            Modifier::PrincipalName(m) => KerberosValue::PrincipalName(m.build()?),
            Modifier::TypedData(K::EncryptionKey, m) => KerberosValue::EncryptionKey(m.build_encryption_key()?),
            Modifier::TypedData(K::Checksum, m) => KerberosValue::Checksum(m.build_checksum()?),
            Modifier::TypedData(K::TransitedEncoding, m) => KerberosValue::TransitedEncoding(m.build_transited()?),
            Modifier::TypedData(K::HostAddress, m) => KerberosValue::HostAddress(m.build_host_address()?),
            Modifier::TypedData(K::AuthorizationDataEntry, m) => {
                KerberosValue::AuthorizationDataEntry(m.build_authorization_entry()?)
            }
            Modifier::TypedData(s, _) => return Err(stack_error(s.name())),
            Modifier::EncryptedData(m) => KerberosValue::EncryptedData(m.build()?),
            Modifier::LastReqEntry(m) => KerberosValue::LastReqEntry(m.build()?),
            Modifier::Ticket(m) => KerberosValue::Ticket(m.build()?),
            Modifier::EncTicketPart(m) => KerberosValue::EncTicketPart(m.build()?),
            Modifier::ChangePasswdData(m) => KerberosValue::ChangePasswdData(m.build()?),
        })
    }
}

#[derive(Debug)]
pub enum KerberosObject {
    Modifier(Modifier),
    /// Elements of a SEQUENCE OF collected so far.
    List(KerberosStructure, Vec<KerberosValue>),
    /// A finished structure waiting for its enclosing field to close.
    Value(KerberosValue),
}

fn stack_error(structure: &'static str) -> DecodeError {
    DecodeError::constraint(structure, "value", "decoder object stack out of step")
}

fn decode_field(
    s: KerberosStructure,
    field: &'static str,
    field_type: FieldType,
    value: &[u8],
) -> Result<FieldValue, DecodeError> {
    let structure = s.name();
    Ok(match field_type {
        FieldType::Int32 => FieldValue::Int(i32_field(value, structure, field)?),
        FieldType::UInt32 => {
            let v = integer_field(value, structure, field)?;
            let v = u32::try_from(v).map_err(|_| {
                DecodeError::constraint(structure, field, format!("{} is out of UInt32 range", v))
            })?;
            FieldValue::UInt(v)
        }
        FieldType::KerberosString => FieldValue::Str(utf8_field(value, structure, field)?),
        FieldType::Octets => FieldValue::Octets(value.to_vec()),
        FieldType::Time => {
            let text = std::str::from_utf8(value)
                .map_err(|_| DecodeError::constraint(structure, field, "time is not ASCII"))?;
            FieldValue::Time(KerberosTime::parse(text)?)
        }
        FieldType::Flags => FieldValue::Flags(TicketFlags::from_bit_string(value)?),
        FieldType::NameStrings | FieldType::Nested(_) => return Err(stack_error(structure)),
    })
}

fn collect_list(s: KerberosStructure, items: Vec<KerberosValue>) -> Result<KerberosValue, DecodeError> {
    use KerberosStructure as K;
    use KerberosValue as V;
    let mismatch = || stack_error(s.name());
    Ok(match s {
        K::HostAddresses => V::HostAddresses(
            items
                .into_iter()
                .map(|v| match v {
                    V::HostAddress(a) => Ok(a),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        ),
        K::AuthorizationData => V::AuthorizationData(
            items
                .into_iter()
                .map(|v| match v {
                    V::AuthorizationDataEntry(e) => Ok(e),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        ),
        K::LastReq => V::LastReq(
            items
                .into_iter()
                .map(|v| match v {
                    V::LastReqEntry(e) => Ok(e),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        ),
        _ => return Err(mismatch()),
    })
}

fn top_modifier(objects: &mut ObjectStack<KerberosObject>, s: KerberosStructure) -> Result<&mut Modifier, DecodeError> {
    match objects.top_mut() {
        Some(KerberosObject::Modifier(m)) => Ok(m),
        _ => Err(stack_error(s.name())),
    }
}

/// A finished value goes into the SEQUENCE OF being collected, or waits on
/// the stack for the explicit field wrapper (or the PDU) to claim it.
fn hand_up(value: KerberosValue, objects: &mut ObjectStack<KerberosObject>) {
    match objects.top_mut() {
        Some(KerberosObject::List(_, items)) => items.push(value),
        _ => objects.push(KerberosObject::Value(value)),
    }
}

impl Grammar for KerberosGrammar {
    type Rule = KerberosRule;
    type Object = KerberosObject;
    type Message = KerberosValue;

    fn root(&self, tag: Tag) -> Option<KerberosRule> {
        let (expected, rule) = structure_rule(self.structure);
        (tag == expected).then_some(rule)
    }

    fn child(&self, parent: KerberosRule, state: u8, tag: Tag) -> Option<Transition<KerberosRule>> {
        match parent {
            KerberosRule::Application(s) => {
                (state == 0 && tag == Tag::SEQUENCE).then(|| Transition::new(KerberosRule::Sequence(s), 1))
            }
            KerberosRule::Sequence(s) => {
                if tag != Tag::context_constructed(tag.number()) {
                    return None;
                }
                let n = u8::try_from(tag.number()).ok()?;
                if n < state {
                    debug!("{} field [{}] after field [{}]", s.name(), n, state.saturating_sub(1));
                    return None;
                }
                field_def(s, n)?;
                Some(Transition::new(KerberosRule::Explicit(s, n), n + 1))
            }
            KerberosRule::SequenceOf(s) => {
                let element = s.element()?;
                let (expected, rule) = structure_rule(element);
                (tag == expected).then(|| Transition::new(rule, state.saturating_add(1)))
            }
            KerberosRule::Explicit(s, n) => {
                if state != 0 {
                    return None;
                }
                let (_, field_type) = field_def(s, n)?;
                let (expected, rule) = field_rule(s, n, field_type);
                (tag == expected).then(|| Transition::new(rule, 1))
            }
            KerberosRule::NameStrings => {
                (tag == Tag::GENERAL_STRING).then(|| Transition::new(KerberosRule::NameString, state.saturating_add(1)))
            }
            KerberosRule::Value(..) | KerberosRule::NameString => None,
        }
    }

    fn tag(&self, rule: KerberosRule, _tag: Tag, objects: &mut ObjectStack<KerberosObject>) -> Result<(), DecodeError> {
        match rule {
            KerberosRule::Sequence(s) => objects.push(KerberosObject::Modifier(Modifier::new(s)?)),
            KerberosRule::SequenceOf(s) => objects.push(KerberosObject::List(s, Vec::new())),
            _ => {}
        }
        Ok(())
    }

    fn value(&self, rule: KerberosRule, value: Bytes, objects: &mut ObjectStack<KerberosObject>) -> Result<(), DecodeError> {
        match rule {
            KerberosRule::Value(s, n) => {
                let (field, field_type) = field_def(s, n).ok_or_else(|| stack_error(s.name()))?;
                let decoded = decode_field(s, field, field_type, &value)?;
                top_modifier(objects, s)?.set(s, n, decoded)
            }
            KerberosRule::NameString => {
                let component = utf8_field(&value, "PrincipalName", "name-string")?;
                match top_modifier(objects, KerberosStructure::PrincipalName)? {
                    Modifier::PrincipalName(m) => {
                        m.add_name(component);
                        Ok(())
                    }
                    _ => Err(stack_error("PrincipalName")),
                }
            }
            _ => Ok(()),
        }
    }

    fn finish(&self, rule: KerberosRule, state: u8, objects: &mut ObjectStack<KerberosObject>) -> Result<(), DecodeError> {
        match rule {
            KerberosRule::Application(s) if state == 0 => Err(DecodeError::missing(s.name(), "SEQUENCE")),
            KerberosRule::Sequence(s) => {
                let Some(KerberosObject::Modifier(modifier)) = objects.pop() else {
                    return Err(stack_error(s.name()));
                };
                hand_up(modifier.build()?, objects);
                Ok(())
            }
            KerberosRule::SequenceOf(s) => {
                let Some(KerberosObject::List(_, items)) = objects.pop() else {
                    return Err(stack_error(s.name()));
                };
                hand_up(collect_list(s, items)?, objects);
                Ok(())
            }
            KerberosRule::Explicit(s, n) => {
                let (field, field_type) = field_def(s, n).ok_or_else(|| stack_error(s.name()))?;
                if state == 0 {
                    return Err(DecodeError::missing(s.name(), field));
                }
                if let FieldType::Nested(_) = field_type {
                    let Some(KerberosObject::Value(inner)) = objects.pop() else {
                        return Err(stack_error(s.name()));
                    };
                    top_modifier(objects, s)?.set(s, n, FieldValue::Nested(inner))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn complete(&self, objects: &mut ObjectStack<KerberosObject>) -> Result<KerberosValue, DecodeError> {
        match objects.pop() {
            Some(KerberosObject::Value(value)) if objects.is_empty() => Ok(value),
            _ => Err(stack_error(self.structure.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digester::CollectingHandler;

    fn decode(structure: KerberosStructure, input: &[u8]) -> CollectingHandler<KerberosValue> {
        let mut decoder = KerberosGrammar::decoder(structure, DecoderConfig::default());
        let mut handler = CollectingHandler::new();
        decoder
            .decode(Bytes::copy_from_slice(input), &mut handler)
            .unwrap();
        handler
    }

    #[test]
    fn test_decode_principal_name() {
        // PrincipalName { name-type 1, name-string { "host", "kdc" } }
        let data = [
            0x30, 0x14, 0xA0, 0x03, 0x02, 0x01, 0x01, 0xA1, 0x0D, 0x30, 0x0B, 0x1B, 0x04, b'h', b'o',
            b's', b't', 0x1B, 0x03, b'k', b'd', b'c',
        ];
        let handler = decode(KerberosStructure::PrincipalName, &data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        assert_eq!(
            handler.messages,
            vec![KerberosValue::PrincipalName(PrincipalName::new(1, &["host", "kdc"]))]
        );
    }

    #[test]
    fn test_decode_encrypted_data_without_kvno() {
        // EncryptedData { etype 18, cipher 'ABC' }
        let data = [
            0x30, 0x0C, 0xA0, 0x03, 0x02, 0x01, 0x12, 0xA2, 0x05, 0x04, 0x03, b'A', b'B', b'C',
        ];
        let handler = decode(KerberosStructure::EncryptedData, &data);
        assert_eq!(
            handler.messages,
            vec![KerberosValue::EncryptedData(EncryptedData {
                etype: 18,
                kvno: None,
                cipher: b"ABC".to_vec(),
            })]
        );
    }

    #[test]
    fn test_missing_required_field() {
        // EncryptedData { etype 18 } without cipher
        let data = [0x30, 0x05, 0xA0, 0x03, 0x02, 0x01, 0x12];
        let handler = decode(KerberosStructure::EncryptedData, &data);
        assert!(handler.messages.is_empty());
        assert!(matches!(
            handler.errors[0],
            DecodeError::DomainConstraintViolation { field: "cipher", .. }
        ));
    }

    #[test]
    fn test_fields_out_of_order_rejected() {
        // EncryptionKey { [1] keyvalue, [0] keytype }
        let data = [
            0x30, 0x0B, 0xA1, 0x04, 0x04, 0x02, 0xAA, 0xBB, 0xA0, 0x03, 0x02, 0x01, 0x11,
        ];
        let handler = decode(KerberosStructure::EncryptionKey, &data);
        assert!(handler.messages.is_empty());
        assert!(matches!(handler.errors[0], DecodeError::UnexpectedTag { .. }));
    }

    #[test]
    fn test_wrong_inner_type_rejected() {
        // Checksum { [0] OCTET STRING } where an INTEGER is required
        let data = [0x30, 0x05, 0xA0, 0x03, 0x04, 0x01, 0x01];
        let handler = decode(KerberosStructure::Checksum, &data);
        assert!(matches!(handler.errors[0], DecodeError::UnexpectedTag { .. }));
    }

    #[test]
    fn test_empty_explicit_wrapper() {
        // HostAddress { [0] <empty>, [1] ... }
        let data = [0x30, 0x07, 0xA0, 0x00, 0xA1, 0x03, 0x04, 0x01, 0x7F];
        let handler = decode(KerberosStructure::HostAddress, &data);
        assert!(matches!(
            handler.errors[0],
            DecodeError::DomainConstraintViolation { field: "addr-type", .. }
        ));
    }

    #[test]
    fn test_decode_last_req_sequence_of() {
        // LastReq { { lr-type 0, lr-value 20240101000000Z } }
        let mut data = vec![0x30, 0x1A, 0x30, 0x18, 0xA0, 0x03, 0x02, 0x01, 0x00, 0xA1, 0x11, 0x18, 0x0F];
        data.extend_from_slice(b"20240101000000Z");
        let handler = decode(KerberosStructure::LastReq, &data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        match &handler.messages[0] {
            KerberosValue::LastReq(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].lr_value.to_generalized_time(), "20240101000000Z");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_root_tag() {
        // a Ticket decoder fed a bare SEQUENCE
        let handler = decode(KerberosStructure::Ticket, &[0x30, 0x00]);
        assert!(handler.messages.is_empty());
        assert!(matches!(handler.errors[0], DecodeError::UnexpectedTag { .. }));
    }

    #[test]
    fn test_empty_sequence_of() {
        let handler = decode(KerberosStructure::HostAddresses, &[0x30, 0x00]);
        assert_eq!(handler.messages, vec![KerberosValue::HostAddresses(Vec::new())]);
    }
}
