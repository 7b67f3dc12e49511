// LDAPv3 protocol model (RFC 4511)
// Messages, operations, results, controls and the search filter tree.

use std::fmt;

use tracing::debug;

use crate::ber::{BerReader, BerWriter};
use crate::error::DecodeError;
use crate::tlv::Tag;

/// RFC 3296 ManageDsaIT control OID
pub const MANAGE_DSA_IT_OID: &str = "2.16.840.1.113730.3.4.2";
/// RFC 2696 Simple Paged Results control OID
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";
/// RFC 3672 Subentries control OID
pub const SUBENTRIES_OID: &str = "1.3.6.1.4.1.4203.1.10.1";
/// RFC 4533 Sync Request Control OID
pub const SYNC_REQUEST_OID: &str = "1.3.6.1.4.1.4203.1.9.1.1";

// LDAP protocol tags
pub const LDAP_TAG_BIND_REQUEST: Tag = Tag::application(0);
pub const LDAP_TAG_BIND_RESPONSE: Tag = Tag::application(1);
pub const LDAP_TAG_UNBIND_REQUEST: Tag = Tag::application_primitive(2);
pub const LDAP_TAG_SEARCH_REQUEST: Tag = Tag::application(3);
pub const LDAP_TAG_SEARCH_RESULT_ENTRY: Tag = Tag::application(4);
pub const LDAP_TAG_SEARCH_RESULT_DONE: Tag = Tag::application(5);
pub const LDAP_TAG_MODIFY_REQUEST: Tag = Tag::application(6);
pub const LDAP_TAG_MODIFY_RESPONSE: Tag = Tag::application(7);
pub const LDAP_TAG_ADD_REQUEST: Tag = Tag::application(8);
pub const LDAP_TAG_ADD_RESPONSE: Tag = Tag::application(9);
pub const LDAP_TAG_DEL_REQUEST: Tag = Tag::application_primitive(10);
pub const LDAP_TAG_DEL_RESPONSE: Tag = Tag::application(11);
pub const LDAP_TAG_MODIFY_DN_REQUEST: Tag = Tag::application(12);
pub const LDAP_TAG_MODIFY_DN_RESPONSE: Tag = Tag::application(13);
pub const LDAP_TAG_COMPARE_REQUEST: Tag = Tag::application(14);
pub const LDAP_TAG_COMPARE_RESPONSE: Tag = Tag::application(15);
pub const LDAP_TAG_ABANDON_REQUEST: Tag = Tag::application_primitive(16);
pub const LDAP_TAG_SEARCH_RESULT_REFERENCE: Tag = Tag::application(19);
pub const LDAP_TAG_EXTENDED_REQUEST: Tag = Tag::application(23);
pub const LDAP_TAG_EXTENDED_RESPONSE: Tag = Tag::application(24);
pub const LDAP_TAG_INTERMEDIATE_RESPONSE: Tag = Tag::application(25);

/// Context [0] IMPLICIT SEQUENCE OF control
pub const LDAP_CONTEXT_CONTROLS: Tag = Tag::context_constructed(0);
pub const LDAP_CONTEXT_SIMPLE_AUTH: Tag = Tag::context(0);
pub const LDAP_CONTEXT_SASL_AUTH: Tag = Tag::context_constructed(3);
pub const LDAP_CONTEXT_REFERRAL: Tag = Tag::context_constructed(3);
pub const LDAP_CONTEXT_SERVER_SASL_CREDS: Tag = Tag::context(7);
pub const LDAP_CONTEXT_NEW_SUPERIOR: Tag = Tag::context(0);
/// requestName / IntermediateResponse responseName
pub const LDAP_CONTEXT_NAME: Tag = Tag::context(0);
/// requestValue / IntermediateResponse responseValue
pub const LDAP_CONTEXT_VALUE: Tag = Tag::context(1);
pub const LDAP_CONTEXT_EXTENDED_RESPONSE_NAME: Tag = Tag::context(10);
pub const LDAP_CONTEXT_EXTENDED_RESPONSE_VALUE: Tag = Tag::context(11);

// Filter CHOICE tags
pub const FILTER_AND: Tag = Tag::context_constructed(0);
pub const FILTER_OR: Tag = Tag::context_constructed(1);
pub const FILTER_NOT: Tag = Tag::context_constructed(2);
pub const FILTER_EQUALITY: Tag = Tag::context_constructed(3);
pub const FILTER_SUBSTRINGS: Tag = Tag::context_constructed(4);
pub const FILTER_GREATER_OR_EQUAL: Tag = Tag::context_constructed(5);
pub const FILTER_LESS_OR_EQUAL: Tag = Tag::context_constructed(6);
pub const FILTER_PRESENT: Tag = Tag::context(7);
pub const FILTER_APPROX: Tag = Tag::context_constructed(8);
pub const FILTER_EXTENSIBLE: Tag = Tag::context_constructed(9);
pub const SUBSTRING_INITIAL: Tag = Tag::context(0);
pub const SUBSTRING_ANY: Tag = Tag::context(1);
pub const SUBSTRING_FINAL: Tag = Tag::context(2);
pub const MATCHING_RULE: Tag = Tag::context(1);
pub const MATCHING_TYPE: Tag = Tag::context(2);
pub const MATCHING_VALUE: Tag = Tag::context(3);
pub const MATCHING_DN_ATTRIBUTES: Tag = Tag::context(4);

// LDAP Message structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapMessage {
    pub message_id: i32,
    pub protocol_op: ProtocolOp,
    pub controls: Vec<Control>,
    /// Controls with an OID this crate does not know. They are dropped from
    /// the message and never re-encoded.
    pub skipped_controls: Vec<SkippedControl>,
}

impl LdapMessage {
    pub fn new(message_id: i32, protocol_op: ProtocolOp) -> Self {
        Self {
            message_id,
            protocol_op,
            controls: Vec::new(),
            skipped_controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }
}

/// A typed request or response control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub critical: bool,
    pub kind: ControlKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    ManageDsaIt,
    PagedResults(PagedResultsControl),
    /// Visibility of subentries (TRUE = only subentries).
    Subentries(bool),
    SyncRequest(SyncRequestControl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResultsControl {
    pub size: i32,
    pub cookie: Vec<u8>,
}

/// Parsed Sync Request control value (RFC 4533)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequestControl {
    /// 1 = refreshOnly, 3 = refreshAndPersist
    pub mode: u8,
    pub cookie: Option<Vec<u8>>,
    pub reload_hint: bool,
}

impl SyncRequestControl {
    pub fn is_refresh_and_persist(&self) -> bool {
        self.mode == 3
    }
}

/// A control that was consumed but not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedControl {
    pub oid: String,
    pub critical: bool,
}

impl Control {
    pub fn new(kind: ControlKind, critical: bool) -> Self {
        Self { critical, kind }
    }

    pub fn oid(&self) -> &'static str {
        match self.kind {
            ControlKind::ManageDsaIt => MANAGE_DSA_IT_OID,
            ControlKind::PagedResults(_) => PAGED_RESULTS_OID,
            ControlKind::Subentries(_) => SUBENTRIES_OID,
            ControlKind::SyncRequest(_) => SYNC_REQUEST_OID,
        }
    }

    /// Build a typed control from its wire parts. `Ok(None)` means the OID is
    /// not registered and the control should be skipped.
    pub fn from_parts(oid: &str, critical: bool, value: Option<&[u8]>) -> Result<Option<Self>, DecodeError> {
        let kind = match oid {
            MANAGE_DSA_IT_OID => {
                if value.is_some() {
                    return Err(DecodeError::constraint(
                        "ManageDsaIT",
                        "controlValue",
                        "control takes no value",
                    ));
                }
                ControlKind::ManageDsaIt
            }
            PAGED_RESULTS_OID => ControlKind::PagedResults(parse_paged_results_value(required_value(
                "PagedResults",
                value,
            )?)?),
            SUBENTRIES_OID => {
                let mut reader = BerReader::new(required_value("Subentries", value)?, "Subentries");
                let visibility = reader.read_boolean()?;
                reader.expect_end()?;
                ControlKind::Subentries(visibility)
            }
            SYNC_REQUEST_OID => ControlKind::SyncRequest(parse_sync_request_value(required_value(
                "SyncRequest",
                value,
            )?)?),
            _ => {
                debug!("Skipping unregistered control {} (critical={})", oid, critical);
                return Ok(None);
            }
        };
        Ok(Some(Control { critical, kind }))
    }

    /// The encoded controlValue, if this control carries one.
    pub fn encoded_value(&self) -> Option<Vec<u8>> {
        let mut writer = BerWriter::new();
        match &self.kind {
            ControlKind::ManageDsaIt => return None,
            ControlKind::PagedResults(paged) => writer.write_sequence(|w| {
                w.write_integer(paged.size as i64);
                w.write_octet_string(&paged.cookie);
            }),
            ControlKind::Subentries(visibility) => writer.write_boolean(*visibility),
            ControlKind::SyncRequest(sync) => writer.write_sequence(|w| {
                w.write_enumerated(sync.mode as i64);
                if let Some(cookie) = &sync.cookie {
                    w.write_octet_string(cookie);
                }
                if sync.reload_hint {
                    w.write_boolean(true);
                }
            }),
        }
        Some(writer.into_vec())
    }
}

fn required_value<'a>(structure: &'static str, value: Option<&'a [u8]>) -> Result<&'a [u8], DecodeError> {
    value.ok_or_else(|| DecodeError::missing(structure, "controlValue"))
}

/// realSearchControlValue ::= SEQUENCE { size INTEGER, cookie OCTET STRING }
fn parse_paged_results_value(data: &[u8]) -> Result<PagedResultsControl, DecodeError> {
    let mut outer = BerReader::new(data, "PagedResults");
    let mut reader = outer.read_sequence()?;
    outer.expect_end()?;
    let size = reader.read_integer()?;
    let size = i32::try_from(size)
        .map_err(|_| DecodeError::constraint("PagedResults", "size", "out of Int32 range"))?;
    let cookie = reader.read_octet_string()?;
    reader.expect_end()?;
    Ok(PagedResultsControl { size, cookie })
}

/// Parse Sync Request control value: SEQUENCE { mode ENUMERATED, cookie OCTET STRING OPT, reloadHint BOOLEAN OPT }
fn parse_sync_request_value(data: &[u8]) -> Result<SyncRequestControl, DecodeError> {
    let mut outer = BerReader::new(data, "SyncRequest");
    let mut reader = outer.read_sequence()?;
    let mode = reader.read_enumerated()?;
    let mode = match mode {
        1 | 3 => mode as u8,
        other => {
            return Err(DecodeError::constraint(
                "SyncRequest",
                "mode",
                format!("unknown mode {}", other),
            ))
        }
    };
    let mut cookie = None;
    let mut reload_hint = false;
    if reader.peek_tag()? == Some(Tag::OCTET_STRING) {
        cookie = Some(reader.read_octet_string()?);
    }
    if reader.peek_tag()? == Some(Tag::BOOLEAN) {
        reload_hint = reader.read_boolean()?;
    }
    reader.expect_end()?;
    Ok(SyncRequestControl {
        mode,
        cookie,
        reload_hint,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolOp {
    BindRequest(BindRequest),
    BindResponse(BindResponse),
    UnbindRequest,
    SearchRequest(SearchRequest),
    SearchResultEntry(SearchResultEntry),
    SearchResultReference(Vec<String>),
    SearchResultDone(LdapResult),
    ModifyRequest(ModifyRequest),
    ModifyResponse(LdapResult),
    AddRequest(AddRequest),
    AddResponse(LdapResult),
    DelRequest(DelRequest),
    DelResponse(LdapResult),
    ModifyDNRequest(ModifyDNRequest),
    ModifyDNResponse(LdapResult),
    CompareRequest(CompareRequest),
    CompareResponse(LdapResult),
    AbandonRequest(i32),
    ExtendedRequest(ExtendedRequest),
    ExtendedResponse(ExtendedResponse),
    IntermediateResponse(IntermediateResponse),
}

impl ProtocolOp {
    /// Short operation name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolOp::BindRequest(_) => "bind_request",
            ProtocolOp::BindResponse(_) => "bind_response",
            ProtocolOp::UnbindRequest => "unbind_request",
            ProtocolOp::SearchRequest(_) => "search_request",
            ProtocolOp::SearchResultEntry(_) => "search_result_entry",
            ProtocolOp::SearchResultReference(_) => "search_result_reference",
            ProtocolOp::SearchResultDone(_) => "search_result_done",
            ProtocolOp::ModifyRequest(_) => "modify_request",
            ProtocolOp::ModifyResponse(_) => "modify_response",
            ProtocolOp::AddRequest(_) => "add_request",
            ProtocolOp::AddResponse(_) => "add_response",
            ProtocolOp::DelRequest(_) => "del_request",
            ProtocolOp::DelResponse(_) => "del_response",
            ProtocolOp::ModifyDNRequest(_) => "modify_dn_request",
            ProtocolOp::ModifyDNResponse(_) => "modify_dn_response",
            ProtocolOp::CompareRequest(_) => "compare_request",
            ProtocolOp::CompareResponse(_) => "compare_response",
            ProtocolOp::AbandonRequest(_) => "abandon_request",
            ProtocolOp::ExtendedRequest(_) => "extended_request",
            ProtocolOp::ExtendedResponse(_) => "extended_response",
            ProtocolOp::IntermediateResponse(_) => "intermediate_response",
        }
    }

    /// Which response kind this is, for operations that carry an LDAPResult.
    pub fn response_kind(&self) -> Option<ResponseKind> {
        Some(match self {
            ProtocolOp::BindResponse(_) => ResponseKind::Bind,
            ProtocolOp::SearchResultDone(_) => ResponseKind::SearchDone,
            ProtocolOp::ModifyResponse(_) => ResponseKind::Modify,
            ProtocolOp::AddResponse(_) => ResponseKind::Add,
            ProtocolOp::DelResponse(_) => ResponseKind::Del,
            ProtocolOp::ModifyDNResponse(_) => ResponseKind::ModifyDN,
            ProtocolOp::CompareResponse(_) => ResponseKind::Compare,
            ProtocolOp::ExtendedResponse(_) => ResponseKind::Extended,
            _ => return None,
        })
    }

    pub fn result(&self) -> Option<&LdapResult> {
        match self {
            ProtocolOp::BindResponse(r) => Some(&r.result),
            ProtocolOp::ExtendedResponse(r) => Some(&r.result),
            ProtocolOp::SearchResultDone(r)
            | ProtocolOp::ModifyResponse(r)
            | ProtocolOp::AddResponse(r)
            | ProtocolOp::DelResponse(r)
            | ProtocolOp::ModifyDNResponse(r)
            | ProtocolOp::CompareResponse(r) => Some(r),
            _ => None,
        }
    }

    pub fn result_mut(&mut self) -> Option<&mut LdapResult> {
        match self {
            ProtocolOp::BindResponse(r) => Some(&mut r.result),
            ProtocolOp::ExtendedResponse(r) => Some(&mut r.result),
            ProtocolOp::SearchResultDone(r)
            | ProtocolOp::ModifyResponse(r)
            | ProtocolOp::AddResponse(r)
            | ProtocolOp::DelResponse(r)
            | ProtocolOp::ModifyDNResponse(r)
            | ProtocolOp::CompareResponse(r) => Some(r),
            _ => None,
        }
    }
}

/// Operations whose body contains an LDAPResult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Bind,
    SearchDone,
    Modify,
    Add,
    Del,
    ModifyDN,
    Compare,
    Extended,
}

impl ResponseKind {
    pub fn name(self) -> &'static str {
        match self {
            ResponseKind::Bind => "BindResponse",
            ResponseKind::SearchDone => "SearchResultDone",
            ResponseKind::Modify => "ModifyResponse",
            ResponseKind::Add => "AddResponse",
            ResponseKind::Del => "DelResponse",
            ResponseKind::ModifyDN => "ModifyDNResponse",
            ResponseKind::Compare => "CompareResponse",
            ResponseKind::Extended => "ExtendedResponse",
        }
    }

    /// Whether a matched DN may already be present before the TLV is read, in
    /// which case the wire value is ignored instead of rejected.
    pub fn prepopulates_matched_dn(self) -> bool {
        match self {
            ResponseKind::Bind
            | ResponseKind::SearchDone
            | ResponseKind::Modify
            | ResponseKind::Add
            | ResponseKind::Del
            | ResponseKind::ModifyDN
            | ResponseKind::Compare
            | ResponseKind::Extended => false,
        }
    }

    pub(crate) fn empty_op(self) -> ProtocolOp {
        match self {
            ResponseKind::Bind => ProtocolOp::BindResponse(BindResponse::default()),
            ResponseKind::SearchDone => ProtocolOp::SearchResultDone(LdapResult::default()),
            ResponseKind::Modify => ProtocolOp::ModifyResponse(LdapResult::default()),
            ResponseKind::Add => ProtocolOp::AddResponse(LdapResult::default()),
            ResponseKind::Del => ProtocolOp::DelResponse(LdapResult::default()),
            ResponseKind::ModifyDN => ProtocolOp::ModifyDNResponse(LdapResult::default()),
            ResponseKind::Compare => ProtocolOp::CompareResponse(LdapResult::default()),
            ResponseKind::Extended => ProtocolOp::ExtendedResponse(ExtendedResponse::default()),
        }
    }
}

/// LDAPResult ::= SEQUENCE { resultCode, matchedDN, diagnosticMessage, referral [3] OPTIONAL }
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapResult {
    pub result_code: i32,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referral: Option<Vec<String>>,
}

impl LdapResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn new(result_code: i32, matched_dn: &str, diagnostic_message: &str) -> Self {
        Self {
            result_code,
            matched_dn: matched_dn.to_string(),
            diagnostic_message: diagnostic_message.to_string(),
            referral: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRequest {
    pub version: i32,
    pub name: String,
    pub authentication: BindAuthentication,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAuthentication {
    Simple(Vec<u8>),
    Sasl {
        mechanism: String,
        credentials: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindResponse {
    pub result: LdapResult,
    pub server_sasl_creds: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    pub size_limit: i32,
    pub time_limit: i32,
    pub types_only: bool,
    pub filter: Filter,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl TryFrom<i64> for SearchScope {
    type Error = DecodeError;
    fn try_from(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            _ => Err(DecodeError::constraint(
                "SearchRequest",
                "scope",
                format!("invalid search scope: {}", value),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliases {
    NeverDerefAliases = 0,
    DerefInSearching = 1,
    DerefFindingBaseObj = 2,
    DerefAlways = 3,
}

impl TryFrom<i64> for DerefAliases {
    type Error = DecodeError;
    fn try_from(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(DerefAliases::NeverDerefAliases),
            1 => Ok(DerefAliases::DerefInSearching),
            2 => Ok(DerefAliases::DerefFindingBaseObj),
            3 => Ok(DerefAliases::DerefAlways),
            _ => Err(DecodeError::constraint(
                "SearchRequest",
                "derefAliases",
                format!("invalid derefAliases: {}", value),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultEntry {
    pub object_name: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyRequest {
    pub object: String,
    pub changes: Vec<ModifyChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyChange {
    pub operation: ModifyOperation,
    pub modification: Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
    /// RFC 4525
    Increment = 3,
}

impl TryFrom<i64> for ModifyOperation {
    type Error = DecodeError;
    fn try_from(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(ModifyOperation::Add),
            1 => Ok(ModifyOperation::Delete),
            2 => Ok(ModifyOperation::Replace),
            3 => Ok(ModifyOperation::Increment),
            _ => Err(DecodeError::constraint(
                "ModifyRequest",
                "operation",
                format!("invalid modify operation: {}", value),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddRequest {
    pub entry: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelRequest {
    pub entry: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyDNRequest {
    pub entry: String,
    pub newrdn: String,
    pub delete_old_rdn: bool,
    pub new_superior: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareRequest {
    pub entry: String,
    pub attr: String,
    pub assertion_value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedRequest {
    pub request_name: String,
    pub request_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedResponse {
    pub result: LdapResult,
    pub response_name: Option<String>,
    pub response_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediateResponse {
    pub response_name: Option<String>,
    pub response_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: String,
    pub attr_values: Vec<Vec<u8>>,
}

impl Attribute {
    pub fn new(attr_type: &str, values: &[&str]) -> Self {
        Self {
            attr_type: attr_type.to_string(),
            attr_values: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        }
    }
}

/// Search filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Branch(Branch),
    Leaf(Leaf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub op: BranchOp,
    pub children: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Attribute description. Empty only for an extensible match with no type.
    pub attribute: String,
    pub assertion: Assertion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    Equality(Vec<u8>),
    GreaterOrEqual(Vec<u8>),
    LessOrEqual(Vec<u8>),
    Approx(Vec<u8>),
    Present,
    Substrings(Substrings),
    Extensible(ExtensibleMatch),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substrings {
    pub initial: Option<Vec<u8>>,
    pub any: Vec<Vec<u8>>,
    pub final_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensibleMatch {
    pub matching_rule: Option<String>,
    pub value: Vec<u8>,
    pub dn_attributes: bool,
}

impl Filter {
    pub fn and(children: Vec<Filter>) -> Self {
        Filter::Branch(Branch {
            op: BranchOp::And,
            children,
        })
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Branch(Branch {
            op: BranchOp::Or,
            children,
        })
    }

    pub fn not(child: Filter) -> Self {
        Filter::Branch(Branch {
            op: BranchOp::Not,
            children: vec![child],
        })
    }

    pub fn leaf(attribute: &str, assertion: Assertion) -> Self {
        Filter::Leaf(Leaf {
            attribute: attribute.to_string(),
            assertion,
        })
    }

    pub fn equality(attribute: &str, value: &str) -> Self {
        Self::leaf(attribute, Assertion::Equality(value.as_bytes().to_vec()))
    }

    pub fn present(attribute: &str) -> Self {
        Self::leaf(attribute, Assertion::Present)
    }

    /// Branch children, or an empty slice for a leaf.
    pub fn children(&self) -> &[Filter] {
        match self {
            Filter::Branch(b) => &b.children,
            Filter::Leaf(_) => &[],
        }
    }
}

impl Default for Filter {
    /// `(objectClass=*)`, the usual match-everything filter.
    fn default() -> Self {
        Filter::present("objectClass")
    }
}

/// RFC 4515 value escaping.
fn write_escaped(f: &mut fmt::Formatter<'_>, value: &[u8]) -> fmt::Result {
    match std::str::from_utf8(value) {
        Ok(s) => {
            for c in s.chars() {
                match c {
                    '*' | '(' | ')' | '\\' | '\0' => write!(f, "\\{:02x}", c as u32)?,
                    _ => write!(f, "{}", c)?,
                }
            }
            Ok(())
        }
        Err(_) => {
            for b in value {
                write!(f, "\\{:02x}", b)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Branch(branch) => {
                let op = match branch.op {
                    BranchOp::And => '&',
                    BranchOp::Or => '|',
                    BranchOp::Not => '!',
                };
                write!(f, "({}", op)?;
                for child in &branch.children {
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Filter::Leaf(leaf) => {
                f.write_str("(")?;
                let attr = &leaf.attribute;
                match &leaf.assertion {
                    Assertion::Equality(v) => {
                        write!(f, "{}=", attr)?;
                        write_escaped(f, v)?;
                    }
                    Assertion::GreaterOrEqual(v) => {
                        write!(f, "{}>=", attr)?;
                        write_escaped(f, v)?;
                    }
                    Assertion::LessOrEqual(v) => {
                        write!(f, "{}<=", attr)?;
                        write_escaped(f, v)?;
                    }
                    Assertion::Approx(v) => {
                        write!(f, "{}~=", attr)?;
                        write_escaped(f, v)?;
                    }
                    Assertion::Present => write!(f, "{}=*", attr)?,
                    Assertion::Substrings(s) => {
                        write!(f, "{}=", attr)?;
                        if let Some(initial) = &s.initial {
                            write_escaped(f, initial)?;
                        }
                        f.write_str("*")?;
                        for any in &s.any {
                            write_escaped(f, any)?;
                            f.write_str("*")?;
                        }
                        if let Some(fin) = &s.final_value {
                            write_escaped(f, fin)?;
                        }
                    }
                    Assertion::Extensible(m) => {
                        f.write_str(attr)?;
                        if m.dn_attributes {
                            f.write_str(":dn")?;
                        }
                        if let Some(rule) = &m.matching_rule {
                            write!(f, ":{}", rule)?;
                        }
                        f.write_str(":=")?;
                        write_escaped(f, &m.value)?;
                    }
                }
                f.write_str(")")
            }
        }
    }
}
