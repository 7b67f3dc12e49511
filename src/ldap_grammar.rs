//! LDAPv3 grammar (RFC 4511) for the [`Digester`](crate::digester::Digester).
//!
//! Every constructed production is a rule with positional states, so repeated
//! children with the same tag (the OCTET STRINGs of an LDAPResult, for
//! instance) are told apart by where they occur. Primitive fields are
//! `LdapRule::Field` and write straight into the object on top of the stack.

use bytes::Bytes;
use tracing::debug;

use crate::ber::{boolean_field, i32_field, integer_field, utf8_field};
use crate::config::DecoderConfig;
use crate::digester::{Digester, Grammar, ObjectStack, Transition};
use crate::error::DecodeError;
use crate::ldap_protocol::*;
use crate::tlv::Tag;

pub type LdapDecoder = Digester<LdapGrammar>;

#[derive(Debug, Clone, Copy, Default)]
pub struct LdapGrammar;

impl LdapGrammar {
    pub fn decoder(config: DecoderConfig) -> LdapDecoder {
        Digester::with_config(LdapGrammar, config)
    }
}

/// Protocol operation being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    BindRequest,
    UnbindRequest,
    SearchRequest,
    SearchResultEntry,
    SearchResultReference,
    ModifyRequest,
    AddRequest,
    DelRequest,
    ModifyDNRequest,
    CompareRequest,
    AbandonRequest,
    ExtendedRequest,
    IntermediateResponse,
    Response(ResponseKind),
}

impl OpKind {
    fn from_tag(tag: Tag) -> Option<Self> {
        Some(match tag {
            LDAP_TAG_BIND_REQUEST => OpKind::BindRequest,
            LDAP_TAG_BIND_RESPONSE => OpKind::Response(ResponseKind::Bind),
            LDAP_TAG_UNBIND_REQUEST => OpKind::UnbindRequest,
            LDAP_TAG_SEARCH_REQUEST => OpKind::SearchRequest,
            LDAP_TAG_SEARCH_RESULT_ENTRY => OpKind::SearchResultEntry,
            LDAP_TAG_SEARCH_RESULT_DONE => OpKind::Response(ResponseKind::SearchDone),
            LDAP_TAG_SEARCH_RESULT_REFERENCE => OpKind::SearchResultReference,
            LDAP_TAG_MODIFY_REQUEST => OpKind::ModifyRequest,
            LDAP_TAG_MODIFY_RESPONSE => OpKind::Response(ResponseKind::Modify),
            LDAP_TAG_ADD_REQUEST => OpKind::AddRequest,
            LDAP_TAG_ADD_RESPONSE => OpKind::Response(ResponseKind::Add),
            LDAP_TAG_DEL_REQUEST => OpKind::DelRequest,
            LDAP_TAG_DEL_RESPONSE => OpKind::Response(ResponseKind::Del),
            LDAP_TAG_MODIFY_DN_REQUEST => OpKind::ModifyDNRequest,
            LDAP_TAG_MODIFY_DN_RESPONSE => OpKind::Response(ResponseKind::ModifyDN),
            LDAP_TAG_COMPARE_REQUEST => OpKind::CompareRequest,
            LDAP_TAG_COMPARE_RESPONSE => OpKind::Response(ResponseKind::Compare),
            LDAP_TAG_ABANDON_REQUEST => OpKind::AbandonRequest,
            LDAP_TAG_EXTENDED_REQUEST => OpKind::ExtendedRequest,
            LDAP_TAG_EXTENDED_RESPONSE => OpKind::Response(ResponseKind::Extended),
            LDAP_TAG_INTERMEDIATE_RESPONSE => OpKind::IntermediateResponse,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            OpKind::BindRequest => "BindRequest",
            OpKind::UnbindRequest => "UnbindRequest",
            OpKind::SearchRequest => "SearchRequest",
            OpKind::SearchResultEntry => "SearchResultEntry",
            OpKind::SearchResultReference => "SearchResultReference",
            OpKind::ModifyRequest => "ModifyRequest",
            OpKind::AddRequest => "AddRequest",
            OpKind::DelRequest => "DelRequest",
            OpKind::ModifyDNRequest => "ModifyDNRequest",
            OpKind::CompareRequest => "CompareRequest",
            OpKind::AbandonRequest => "AbandonRequest",
            OpKind::ExtendedRequest => "ExtendedRequest",
            OpKind::IntermediateResponse => "IntermediateResponse",
            OpKind::Response(kind) => kind.name(),
        }
    }

    fn empty_op(self) -> ProtocolOp {
        match self {
            OpKind::BindRequest => ProtocolOp::BindRequest(BindRequest {
                version: 0,
                name: String::new(),
                authentication: BindAuthentication::Simple(Vec::new()),
            }),
            OpKind::UnbindRequest => ProtocolOp::UnbindRequest,
            OpKind::SearchRequest => ProtocolOp::SearchRequest(SearchRequest {
                base_object: String::new(),
                scope: SearchScope::BaseObject,
                deref_aliases: DerefAliases::NeverDerefAliases,
                size_limit: 0,
                time_limit: 0,
                types_only: false,
                filter: Filter::default(),
                attributes: Vec::new(),
            }),
            OpKind::SearchResultEntry => ProtocolOp::SearchResultEntry(SearchResultEntry::default()),
            OpKind::SearchResultReference => ProtocolOp::SearchResultReference(Vec::new()),
            OpKind::ModifyRequest => ProtocolOp::ModifyRequest(ModifyRequest::default()),
            OpKind::AddRequest => ProtocolOp::AddRequest(AddRequest::default()),
            OpKind::DelRequest => ProtocolOp::DelRequest(DelRequest::default()),
            OpKind::ModifyDNRequest => ProtocolOp::ModifyDNRequest(ModifyDNRequest::default()),
            OpKind::CompareRequest => ProtocolOp::CompareRequest(CompareRequest::default()),
            OpKind::AbandonRequest => ProtocolOp::AbandonRequest(0),
            OpKind::ExtendedRequest => ProtocolOp::ExtendedRequest(ExtendedRequest::default()),
            OpKind::IntermediateResponse => {
                ProtocolOp::IntermediateResponse(IntermediateResponse::default())
            }
            OpKind::Response(kind) => kind.empty_op(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    And,
    Or,
    Not,
    Equality,
    Substrings,
    GreaterOrEqual,
    LessOrEqual,
    Present,
    Approx,
    Extensible,
}

impl FilterKind {
    fn from_tag(tag: Tag) -> Option<Self> {
        Some(match tag {
            FILTER_AND => FilterKind::And,
            FILTER_OR => FilterKind::Or,
            FILTER_NOT => FilterKind::Not,
            FILTER_EQUALITY => FilterKind::Equality,
            FILTER_SUBSTRINGS => FilterKind::Substrings,
            FILTER_GREATER_OR_EQUAL => FilterKind::GreaterOrEqual,
            FILTER_LESS_OR_EQUAL => FilterKind::LessOrEqual,
            FILTER_PRESENT => FilterKind::Present,
            FILTER_APPROX => FilterKind::Approx,
            FILTER_EXTENSIBLE => FilterKind::Extensible,
            _ => return None,
        })
    }

    fn empty(self) -> Filter {
        let branch = |op| {
            Filter::Branch(Branch {
                op,
                children: Vec::new(),
            })
        };
        let leaf = |assertion| Filter::leaf("", assertion);
        match self {
            FilterKind::And => branch(BranchOp::And),
            FilterKind::Or => branch(BranchOp::Or),
            FilterKind::Not => branch(BranchOp::Not),
            FilterKind::Equality => leaf(Assertion::Equality(Vec::new())),
            FilterKind::Substrings => leaf(Assertion::Substrings(Substrings::default())),
            FilterKind::GreaterOrEqual => leaf(Assertion::GreaterOrEqual(Vec::new())),
            FilterKind::LessOrEqual => leaf(Assertion::LessOrEqual(Vec::new())),
            FilterKind::Present => leaf(Assertion::Present),
            FilterKind::Approx => leaf(Assertion::Approx(Vec::new())),
            FilterKind::Extensible => leaf(Assertion::Extensible(ExtensibleMatch::default())),
        }
    }
}

/// Primitive fields; each one writes into the object on top of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdapField {
    MessageId,
    BindVersion,
    BindName,
    SimpleCredentials,
    SaslMechanism,
    SaslCredentials,
    ResultCode,
    MatchedDn,
    DiagnosticMessage,
    ReferralUri,
    ServerSaslCreds,
    ResponseName,
    ResponseValue,
    /// The DN an operation targets (objectName, object, entry).
    Entry,
    BaseObject,
    Scope,
    DerefAliases,
    SizeLimit,
    TimeLimit,
    TypesOnly,
    SearchAttribute,
    AttributeType,
    AttributeValue,
    ReferenceUri,
    ChangeOperation,
    NewRdn,
    DeleteOldRdn,
    NewSuperior,
    AvaType,
    AvaValue,
    RequestName,
    RequestValue,
    ControlType,
    ControlCriticality,
    ControlValue,
    FilterAttribute,
    FilterValue,
    SubInitial,
    SubAny,
    SubFinal,
    MatchingRule,
    MatchingType,
    MatchingValue,
    DnAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdapRule {
    Message,
    Op(OpKind),
    Field(LdapField),
    SaslAuth,
    Referral,
    SearchAttributes,
    AttributeList,
    Attribute,
    AttributeValues,
    Changes,
    Change,
    Ava,
    Controls,
    Control,
    Filter(FilterKind),
    SubstringList,
}

impl LdapRule {
    /// Lowest grammar state at which the construct is complete, with the
    /// field reported when it is not.
    fn completion(self) -> Option<(u8, &'static str, &'static str)> {
        use OpKind::*;
        Some(match self {
            LdapRule::Message => (2, "LDAPMessage", "protocolOp"),
            LdapRule::Op(BindRequest) => (3, "BindRequest", "authentication"),
            LdapRule::Op(SearchRequest) => (8, "SearchRequest", "attributes"),
            LdapRule::Op(SearchResultEntry) => (2, "SearchResultEntry", "attributes"),
            LdapRule::Op(SearchResultReference) => (1, "SearchResultReference", "uri"),
            LdapRule::Op(ModifyRequest) => (2, "ModifyRequest", "changes"),
            LdapRule::Op(AddRequest) => (2, "AddRequest", "attributes"),
            LdapRule::Op(ModifyDNRequest) => (3, "ModifyDNRequest", "deleteoldrdn"),
            LdapRule::Op(CompareRequest) => (2, "CompareRequest", "ava"),
            LdapRule::Op(ExtendedRequest) => (1, "ExtendedRequest", "requestName"),
            LdapRule::Op(Response(kind)) => (3, kind.name(), "diagnosticMessage"),
            LdapRule::SaslAuth => (1, "SaslCredentials", "mechanism"),
            LdapRule::Referral => (1, "Referral", "uri"),
            LdapRule::Attribute => (2, "PartialAttribute", "vals"),
            LdapRule::Change => (2, "Change", "modification"),
            LdapRule::Ava => (2, "AttributeValueAssertion", "assertionValue"),
            LdapRule::Control => (1, "Control", "controlType"),
            LdapRule::Filter(FilterKind::Not) => (1, "Filter", "not"),
            LdapRule::Filter(
                FilterKind::Equality
                | FilterKind::GreaterOrEqual
                | FilterKind::LessOrEqual
                | FilterKind::Approx,
            ) => (2, "AttributeValueAssertion", "assertionValue"),
            LdapRule::Filter(FilterKind::Substrings) => (2, "SubstringFilter", "substrings"),
            LdapRule::Filter(FilterKind::Extensible) => (3, "MatchingRuleAssertion", "matchValue"),
            LdapRule::SubstringList => (1, "SubstringFilter", "substrings"),
            _ => return None,
        })
    }
}

fn field(field: LdapField, next_state: u8) -> Option<Transition<LdapRule>> {
    Some(Transition::new(LdapRule::Field(field), next_state))
}

fn rule(rule: LdapRule, next_state: u8) -> Option<Transition<LdapRule>> {
    Some(Transition::new(rule, next_state))
}

/// Children of an LDAPResult-bearing response.
fn response_child(kind: ResponseKind, state: u8, tag: Tag) -> Option<Transition<LdapRule>> {
    use LdapField::*;
    match (state, tag) {
        (0, Tag::ENUMERATED) => field(ResultCode, 1),
        (1, Tag::OCTET_STRING) => field(MatchedDn, 2),
        (2, Tag::OCTET_STRING) => field(DiagnosticMessage, 3),
        (3, LDAP_CONTEXT_REFERRAL) => rule(LdapRule::Referral, 4),
        (3 | 4, LDAP_CONTEXT_SERVER_SASL_CREDS) if kind == ResponseKind::Bind => {
            field(ServerSaslCreds, 5)
        }
        (3 | 4, LDAP_CONTEXT_EXTENDED_RESPONSE_NAME) if kind == ResponseKind::Extended => {
            field(ResponseName, 5)
        }
        (3..=5, LDAP_CONTEXT_EXTENDED_RESPONSE_VALUE) if kind == ResponseKind::Extended => {
            field(ResponseValue, 6)
        }
        _ => None,
    }
}

fn op_child(kind: OpKind, state: u8, tag: Tag) -> Option<Transition<LdapRule>> {
    use LdapField::*;
    match kind {
        OpKind::BindRequest => match (state, tag) {
            (0, Tag::INTEGER) => field(BindVersion, 1),
            (1, Tag::OCTET_STRING) => field(BindName, 2),
            (2, LDAP_CONTEXT_SIMPLE_AUTH) => field(SimpleCredentials, 3),
            (2, LDAP_CONTEXT_SASL_AUTH) => rule(LdapRule::SaslAuth, 3),
            _ => None,
        },
        OpKind::SearchRequest => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(BaseObject, 1),
            (1, Tag::ENUMERATED) => field(Scope, 2),
            (2, Tag::ENUMERATED) => field(DerefAliases, 3),
            (3, Tag::INTEGER) => field(SizeLimit, 4),
            (4, Tag::INTEGER) => field(TimeLimit, 5),
            (5, Tag::BOOLEAN) => field(TypesOnly, 6),
            (6, _) => FilterKind::from_tag(tag).and_then(|k| rule(LdapRule::Filter(k), 7)),
            (7, Tag::SEQUENCE) => rule(LdapRule::SearchAttributes, 8),
            _ => None,
        },
        OpKind::SearchResultEntry | OpKind::AddRequest => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(Entry, 1),
            (1, Tag::SEQUENCE) => rule(LdapRule::AttributeList, 2),
            _ => None,
        },
        OpKind::SearchResultReference => match tag {
            Tag::OCTET_STRING => field(ReferenceUri, 1),
            _ => None,
        },
        OpKind::ModifyRequest => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(Entry, 1),
            (1, Tag::SEQUENCE) => rule(LdapRule::Changes, 2),
            _ => None,
        },
        OpKind::ModifyDNRequest => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(Entry, 1),
            (1, Tag::OCTET_STRING) => field(NewRdn, 2),
            (2, Tag::BOOLEAN) => field(DeleteOldRdn, 3),
            (3, LDAP_CONTEXT_NEW_SUPERIOR) => field(NewSuperior, 4),
            _ => None,
        },
        OpKind::CompareRequest => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(Entry, 1),
            (1, Tag::SEQUENCE) => rule(LdapRule::Ava, 2),
            _ => None,
        },
        OpKind::ExtendedRequest => match (state, tag) {
            (0, LDAP_CONTEXT_NAME) => field(RequestName, 1),
            (1, LDAP_CONTEXT_VALUE) => field(RequestValue, 2),
            _ => None,
        },
        OpKind::IntermediateResponse => match (state, tag) {
            (0, LDAP_CONTEXT_NAME) => field(ResponseName, 1),
            (0 | 1, LDAP_CONTEXT_VALUE) => field(ResponseValue, 2),
            _ => None,
        },
        OpKind::Response(kind) => response_child(kind, state, tag),
        OpKind::UnbindRequest | OpKind::DelRequest | OpKind::AbandonRequest => None,
    }
}

fn filter_child(kind: FilterKind, state: u8, tag: Tag) -> Option<Transition<LdapRule>> {
    use LdapField::*;
    match kind {
        FilterKind::And | FilterKind::Or => {
            FilterKind::from_tag(tag).and_then(|k| rule(LdapRule::Filter(k), 1))
        }
        FilterKind::Not if state == 0 => {
            FilterKind::from_tag(tag).and_then(|k| rule(LdapRule::Filter(k), 1))
        }
        FilterKind::Not => None,
        FilterKind::Equality
        | FilterKind::GreaterOrEqual
        | FilterKind::LessOrEqual
        | FilterKind::Approx => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(FilterAttribute, 1),
            (1, Tag::OCTET_STRING) => field(FilterValue, 2),
            _ => None,
        },
        FilterKind::Substrings => match (state, tag) {
            (0, Tag::OCTET_STRING) => field(FilterAttribute, 1),
            (1, Tag::SEQUENCE) => rule(LdapRule::SubstringList, 2),
            _ => None,
        },
        FilterKind::Extensible => match (state, tag) {
            (0, MATCHING_RULE) => field(MatchingRule, 1),
            (0 | 1, MATCHING_TYPE) => field(MatchingType, 2),
            (0..=2, MATCHING_VALUE) => field(MatchingValue, 3),
            (3, MATCHING_DN_ATTRIBUTES) => field(DnAttributes, 4),
            _ => None,
        },
        FilterKind::Present => None,
    }
}

/// In-progress objects on the decoder's object stack.
#[derive(Debug)]
pub enum LdapObject {
    Message(MessageBuilder),
    Op(OpBuilder),
    Attribute(Attribute),
    Change(ModifyChange),
    Control(ControlBuilder),
    Filter(Filter),
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    message_id: i32,
    protocol_op: Option<ProtocolOp>,
    controls: Vec<Control>,
    skipped_controls: Vec<SkippedControl>,
}

#[derive(Debug)]
pub struct OpBuilder {
    op: ProtocolOp,
    matched_dn_set: bool,
}

impl OpBuilder {
    fn new(kind: OpKind) -> Self {
        Self {
            op: kind.empty_op(),
            matched_dn_set: false,
        }
    }

    fn set_matched_dn(&mut self, dn: String) -> Result<(), DecodeError> {
        let kind = self
            .op
            .response_kind()
            .ok_or_else(|| DecodeError::constraint(self.op.name(), "matchedDN", "not a response"))?;
        let result = self
            .op
            .result_mut()
            .ok_or_else(|| DecodeError::missing(kind.name(), "LDAPResult"))?;
        record_matched_dn(
            kind,
            kind.prepopulates_matched_dn(),
            &mut self.matched_dn_set,
            &mut result.matched_dn,
            dn,
        )
    }
}

/// Store a matched DN at most once. A kind that pre-populates the value keeps
/// the existing one and ignores the wire value.
pub(crate) fn record_matched_dn(
    kind: ResponseKind,
    prepopulated: bool,
    already_set: &mut bool,
    slot: &mut String,
    dn: String,
) -> Result<(), DecodeError> {
    if *already_set {
        if prepopulated {
            debug!("{}: keeping pre-populated matched DN '{}'", kind.name(), slot);
            return Ok(());
        }
        return Err(DecodeError::constraint(
            kind.name(),
            "matchedDN",
            "matched DN set more than once",
        ));
    }
    *slot = dn;
    *already_set = true;
    Ok(())
}

#[derive(Debug, Default)]
pub struct ControlBuilder {
    oid: String,
    critical: bool,
    value: Option<Vec<u8>>,
}

fn stack_error(expected: &'static str) -> DecodeError {
    DecodeError::constraint("LDAPMessage", expected, "decoder object stack out of step")
}

fn top_message(objects: &mut ObjectStack<LdapObject>) -> Result<&mut MessageBuilder, DecodeError> {
    match objects.top_mut() {
        Some(LdapObject::Message(m)) => Ok(m),
        _ => Err(stack_error("message")),
    }
}

fn top_op(objects: &mut ObjectStack<LdapObject>) -> Result<&mut OpBuilder, DecodeError> {
    match objects.top_mut() {
        Some(LdapObject::Op(op)) => Ok(op),
        _ => Err(stack_error("protocolOp")),
    }
}

fn top_result(objects: &mut ObjectStack<LdapObject>) -> Result<&mut LdapResult, DecodeError> {
    top_op(objects)?
        .op
        .result_mut()
        .ok_or_else(|| stack_error("LDAPResult"))
}

fn top_bind(objects: &mut ObjectStack<LdapObject>) -> Result<&mut BindRequest, DecodeError> {
    match &mut top_op(objects)?.op {
        ProtocolOp::BindRequest(bind) => Ok(bind),
        _ => Err(stack_error("BindRequest")),
    }
}

fn top_search(objects: &mut ObjectStack<LdapObject>) -> Result<&mut SearchRequest, DecodeError> {
    match &mut top_op(objects)?.op {
        ProtocolOp::SearchRequest(search) => Ok(search),
        _ => Err(stack_error("SearchRequest")),
    }
}

fn top_modify_dn(objects: &mut ObjectStack<LdapObject>) -> Result<&mut ModifyDNRequest, DecodeError> {
    match &mut top_op(objects)?.op {
        ProtocolOp::ModifyDNRequest(req) => Ok(req),
        _ => Err(stack_error("ModifyDNRequest")),
    }
}

fn top_attribute(objects: &mut ObjectStack<LdapObject>) -> Result<&mut Attribute, DecodeError> {
    match objects.top_mut() {
        Some(LdapObject::Attribute(a)) => Ok(a),
        _ => Err(stack_error("attribute")),
    }
}

fn top_control(objects: &mut ObjectStack<LdapObject>) -> Result<&mut ControlBuilder, DecodeError> {
    match objects.top_mut() {
        Some(LdapObject::Control(c)) => Ok(c),
        _ => Err(stack_error("control")),
    }
}

fn top_leaf(objects: &mut ObjectStack<LdapObject>) -> Result<&mut Leaf, DecodeError> {
    match objects.top_mut() {
        Some(LdapObject::Filter(Filter::Leaf(leaf))) => Ok(leaf),
        _ => Err(stack_error("filter")),
    }
}

fn top_substrings(objects: &mut ObjectStack<LdapObject>) -> Result<&mut Substrings, DecodeError> {
    match &mut top_leaf(objects)?.assertion {
        Assertion::Substrings(s) => Ok(s),
        _ => Err(stack_error("substrings")),
    }
}

fn top_extensible(objects: &mut ObjectStack<LdapObject>) -> Result<&mut ExtensibleMatch, DecodeError> {
    match &mut top_leaf(objects)?.assertion {
        Assertion::Extensible(m) => Ok(m),
        _ => Err(stack_error("matchingRuleAssertion")),
    }
}

fn apply_field(field: LdapField, value: &[u8], objects: &mut ObjectStack<LdapObject>) -> Result<(), DecodeError> {
    use LdapField::*;
    match field {
        MessageId => {
            let id = i32_field(value, "LDAPMessage", "messageID")?;
            if id < 0 {
                return Err(DecodeError::constraint("LDAPMessage", "messageID", "negative message ID"));
            }
            top_message(objects)?.message_id = id;
        }
        BindVersion => {
            let version = i32_field(value, "BindRequest", "version")?;
            if !(1..=127).contains(&version) {
                return Err(DecodeError::constraint(
                    "BindRequest",
                    "version",
                    format!("version {} outside 1..127", version),
                ));
            }
            top_bind(objects)?.version = version;
        }
        BindName => top_bind(objects)?.name = utf8_field(value, "BindRequest", "name")?,
        SimpleCredentials => {
            top_bind(objects)?.authentication = BindAuthentication::Simple(value.to_vec());
        }
        SaslMechanism => {
            let name = utf8_field(value, "SaslCredentials", "mechanism")?;
            match &mut top_bind(objects)?.authentication {
                BindAuthentication::Sasl { mechanism, .. } => *mechanism = name,
                _ => return Err(stack_error("SaslCredentials")),
            }
        }
        SaslCredentials => match &mut top_bind(objects)?.authentication {
            BindAuthentication::Sasl { credentials, .. } => *credentials = Some(value.to_vec()),
            _ => return Err(stack_error("SaslCredentials")),
        },
        ResultCode => {
            let code = integer_field(value, "LDAPResult", "resultCode")?;
            let code = i32::try_from(code)
                .ok()
                .filter(|c| *c >= 0)
                .ok_or_else(|| {
                    DecodeError::constraint("LDAPResult", "resultCode", format!("invalid result code {}", code))
                })?;
            top_result(objects)?.result_code = code;
        }
        MatchedDn => {
            let dn = utf8_field(value, "LDAPResult", "matchedDN")?;
            top_op(objects)?.set_matched_dn(dn)?;
        }
        DiagnosticMessage => {
            top_result(objects)?.diagnostic_message = utf8_field(value, "LDAPResult", "diagnosticMessage")?;
        }
        ReferralUri => {
            let uri = utf8_field(value, "Referral", "uri")?;
            top_result(objects)?.referral.get_or_insert_with(Vec::new).push(uri);
        }
        ServerSaslCreds => match &mut top_op(objects)?.op {
            ProtocolOp::BindResponse(resp) => resp.server_sasl_creds = Some(value.to_vec()),
            _ => return Err(stack_error("BindResponse")),
        },
        ResponseName => {
            let name = utf8_field(value, "ExtendedResponse", "responseName")?;
            match &mut top_op(objects)?.op {
                ProtocolOp::ExtendedResponse(resp) => resp.response_name = Some(name),
                ProtocolOp::IntermediateResponse(resp) => resp.response_name = Some(name),
                _ => return Err(stack_error("responseName")),
            }
        }
        ResponseValue => match &mut top_op(objects)?.op {
            ProtocolOp::ExtendedResponse(resp) => resp.response_value = Some(value.to_vec()),
            ProtocolOp::IntermediateResponse(resp) => resp.response_value = Some(value.to_vec()),
            _ => return Err(stack_error("responseValue")),
        },
        Entry => {
            let dn = utf8_field(value, "LDAPDN", "entry")?;
            match &mut top_op(objects)?.op {
                ProtocolOp::SearchResultEntry(e) => e.object_name = dn,
                ProtocolOp::ModifyRequest(m) => m.object = dn,
                ProtocolOp::AddRequest(a) => a.entry = dn,
                ProtocolOp::ModifyDNRequest(m) => m.entry = dn,
                ProtocolOp::CompareRequest(c) => c.entry = dn,
                _ => return Err(stack_error("entry")),
            }
        }
        BaseObject => {
            top_search(objects)?.base_object = utf8_field(value, "SearchRequest", "baseObject")?;
        }
        Scope => {
            let scope = SearchScope::try_from(integer_field(value, "SearchRequest", "scope")?)?;
            top_search(objects)?.scope = scope;
        }
        DerefAliases => {
            let deref = crate::ldap_protocol::DerefAliases::try_from(integer_field(
                value,
                "SearchRequest",
                "derefAliases",
            )?)?;
            top_search(objects)?.deref_aliases = deref;
        }
        SizeLimit => top_search(objects)?.size_limit = non_negative(value, "sizeLimit")?,
        TimeLimit => top_search(objects)?.time_limit = non_negative(value, "timeLimit")?,
        TypesOnly => {
            top_search(objects)?.types_only = boolean_field(value, "SearchRequest", "typesOnly")?;
        }
        SearchAttribute => {
            let attribute = utf8_field(value, "SearchRequest", "attributes")?;
            top_search(objects)?.attributes.push(attribute);
        }
        AttributeType => {
            top_attribute(objects)?.attr_type = utf8_field(value, "PartialAttribute", "type")?;
        }
        AttributeValue => top_attribute(objects)?.attr_values.push(value.to_vec()),
        ReferenceUri => {
            let uri = utf8_field(value, "SearchResultReference", "uri")?;
            match &mut top_op(objects)?.op {
                ProtocolOp::SearchResultReference(uris) => uris.push(uri),
                _ => return Err(stack_error("SearchResultReference")),
            }
        }
        ChangeOperation => {
            let operation = ModifyOperation::try_from(integer_field(value, "Change", "operation")?)?;
            match objects.top_mut() {
                Some(LdapObject::Change(change)) => change.operation = operation,
                _ => return Err(stack_error("change")),
            }
        }
        NewRdn => top_modify_dn(objects)?.newrdn = utf8_field(value, "ModifyDNRequest", "newrdn")?,
        DeleteOldRdn => {
            top_modify_dn(objects)?.delete_old_rdn =
                boolean_field(value, "ModifyDNRequest", "deleteoldrdn")?;
        }
        NewSuperior => {
            top_modify_dn(objects)?.new_superior =
                Some(utf8_field(value, "ModifyDNRequest", "newSuperior")?);
        }
        AvaType | AvaValue => {
            let ProtocolOp::CompareRequest(req) = &mut top_op(objects)?.op else {
                return Err(stack_error("CompareRequest"));
            };
            if field == AvaType {
                req.attr = utf8_field(value, "AttributeValueAssertion", "attributeDesc")?;
            } else {
                req.assertion_value = value.to_vec();
            }
        }
        RequestName | RequestValue => {
            let ProtocolOp::ExtendedRequest(req) = &mut top_op(objects)?.op else {
                return Err(stack_error("ExtendedRequest"));
            };
            if field == RequestName {
                req.request_name = utf8_field(value, "ExtendedRequest", "requestName")?;
            } else {
                req.request_value = Some(value.to_vec());
            }
        }
        ControlType => top_control(objects)?.oid = utf8_field(value, "Control", "controlType")?,
        ControlCriticality => top_control(objects)?.critical = boolean_field(value, "Control", "criticality")?,
        ControlValue => top_control(objects)?.value = Some(value.to_vec()),
        FilterAttribute => {
            top_leaf(objects)?.attribute = utf8_field(value, "Filter", "attributeDesc")?;
        }
        FilterValue => match &mut top_leaf(objects)?.assertion {
            Assertion::Equality(v)
            | Assertion::GreaterOrEqual(v)
            | Assertion::LessOrEqual(v)
            | Assertion::Approx(v) => *v = value.to_vec(),
            _ => return Err(stack_error("assertionValue")),
        },
        SubInitial => top_substrings(objects)?.initial = Some(value.to_vec()),
        SubAny => top_substrings(objects)?.any.push(value.to_vec()),
        SubFinal => top_substrings(objects)?.final_value = Some(value.to_vec()),
        MatchingRule => {
            top_extensible(objects)?.matching_rule =
                Some(utf8_field(value, "MatchingRuleAssertion", "matchingRule")?);
        }
        MatchingType => {
            top_leaf(objects)?.attribute = utf8_field(value, "MatchingRuleAssertion", "type")?;
        }
        MatchingValue => top_extensible(objects)?.value = value.to_vec(),
        DnAttributes => {
            top_extensible(objects)?.dn_attributes =
                boolean_field(value, "MatchingRuleAssertion", "dnAttributes")?;
        }
    }
    Ok(())
}

fn non_negative(value: &[u8], field: &'static str) -> Result<i32, DecodeError> {
    let n = i32_field(value, "SearchRequest", field)?;
    if n < 0 {
        return Err(DecodeError::constraint("SearchRequest", field, format!("negative limit {}", n)));
    }
    Ok(n)
}

/// Value of a primitive protocol op (DelRequest, AbandonRequest, UnbindRequest).
fn apply_primitive_op(kind: OpKind, value: &[u8], objects: &mut ObjectStack<LdapObject>) -> Result<(), DecodeError> {
    let op = &mut top_op(objects)?.op;
    match (kind, op) {
        (OpKind::DelRequest, ProtocolOp::DelRequest(del)) => {
            del.entry = utf8_field(value, "DelRequest", "entry")?;
        }
        (OpKind::AbandonRequest, ProtocolOp::AbandonRequest(id)) => {
            *id = i32_field(value, "AbandonRequest", "messageID")?;
        }
        (OpKind::UnbindRequest, ProtocolOp::UnbindRequest) => {
            if !value.is_empty() {
                return Err(DecodeError::constraint("UnbindRequest", "value", "UnbindRequest must be NULL"));
            }
        }
        _ => return Err(DecodeError::constraint(kind.name(), "value", "operation is not primitive")),
    }
    Ok(())
}

/// Attach a finished filter to its parent branch or to the SearchRequest.
fn attach_filter(filter: Filter, objects: &mut ObjectStack<LdapObject>) -> Result<(), DecodeError> {
    match objects.top_mut() {
        Some(LdapObject::Filter(Filter::Branch(parent))) => {
            parent.children.push(filter);
            Ok(())
        }
        Some(LdapObject::Op(OpBuilder {
            op: ProtocolOp::SearchRequest(search),
            ..
        })) => {
            search.filter = filter;
            Ok(())
        }
        _ => Err(stack_error("filter")),
    }
}

impl Grammar for LdapGrammar {
    type Rule = LdapRule;
    type Object = LdapObject;
    type Message = LdapMessage;

    fn root(&self, tag: Tag) -> Option<LdapRule> {
        (tag == Tag::SEQUENCE).then_some(LdapRule::Message)
    }

    fn child(&self, parent: LdapRule, state: u8, tag: Tag) -> Option<Transition<LdapRule>> {
        use LdapField::*;
        match parent {
            LdapRule::Message => match (state, tag) {
                (0, Tag::INTEGER) => field(MessageId, 1),
                (1, _) => OpKind::from_tag(tag).and_then(|k| rule(LdapRule::Op(k), 2)),
                (2, LDAP_CONTEXT_CONTROLS) => rule(LdapRule::Controls, 3),
                _ => None,
            },
            LdapRule::Op(kind) => op_child(kind, state, tag),
            LdapRule::SaslAuth => match (state, tag) {
                (0, Tag::OCTET_STRING) => field(SaslMechanism, 1),
                (1, Tag::OCTET_STRING) => field(SaslCredentials, 2),
                _ => None,
            },
            LdapRule::Referral => match tag {
                Tag::OCTET_STRING => field(ReferralUri, 1),
                _ => None,
            },
            LdapRule::SearchAttributes => match tag {
                Tag::OCTET_STRING => field(SearchAttribute, 1),
                _ => None,
            },
            LdapRule::AttributeList => match tag {
                Tag::SEQUENCE => rule(LdapRule::Attribute, 1),
                _ => None,
            },
            LdapRule::Attribute => match (state, tag) {
                (0, Tag::OCTET_STRING) => field(AttributeType, 1),
                (1, Tag::SET) => rule(LdapRule::AttributeValues, 2),
                _ => None,
            },
            LdapRule::AttributeValues => match tag {
                Tag::OCTET_STRING => field(AttributeValue, 1),
                _ => None,
            },
            LdapRule::Changes => match tag {
                Tag::SEQUENCE => rule(LdapRule::Change, 1),
                _ => None,
            },
            LdapRule::Change => match (state, tag) {
                (0, Tag::ENUMERATED) => field(ChangeOperation, 1),
                (1, Tag::SEQUENCE) => rule(LdapRule::Attribute, 2),
                _ => None,
            },
            LdapRule::Ava => match (state, tag) {
                (0, Tag::OCTET_STRING) => field(AvaType, 1),
                (1, Tag::OCTET_STRING) => field(AvaValue, 2),
                _ => None,
            },
            LdapRule::Controls => match tag {
                Tag::SEQUENCE => rule(LdapRule::Control, 1),
                _ => None,
            },
            LdapRule::Control => match (state, tag) {
                (0, Tag::OCTET_STRING) => field(ControlType, 1),
                (1, Tag::BOOLEAN) => field(ControlCriticality, 2),
                (1 | 2, Tag::OCTET_STRING) => field(ControlValue, 3),
                _ => None,
            },
            LdapRule::Filter(kind) => filter_child(kind, state, tag),
            LdapRule::SubstringList => match (state, tag) {
                (0, SUBSTRING_INITIAL) => field(SubInitial, 1),
                (0..=2, SUBSTRING_ANY) => field(SubAny, 2),
                (0..=2, SUBSTRING_FINAL) => field(SubFinal, 3),
                _ => None,
            },
            LdapRule::Field(_) => None,
        }
    }

    fn is_tolerant(&self, rule: LdapRule) -> bool {
        rule == LdapRule::Controls
    }

    fn tag(&self, rule: LdapRule, _tag: Tag, objects: &mut ObjectStack<LdapObject>) -> Result<(), DecodeError> {
        match rule {
            LdapRule::Message => objects.push(LdapObject::Message(MessageBuilder::default())),
            LdapRule::Op(kind) => objects.push(LdapObject::Op(OpBuilder::new(kind))),
            LdapRule::Attribute => objects.push(LdapObject::Attribute(Attribute::default())),
            LdapRule::Change => objects.push(LdapObject::Change(ModifyChange {
                operation: ModifyOperation::Add,
                modification: Attribute::default(),
            })),
            LdapRule::Control => objects.push(LdapObject::Control(ControlBuilder::default())),
            LdapRule::Filter(kind) => objects.push(LdapObject::Filter(kind.empty())),
            LdapRule::Referral => {
                top_result(objects)?.referral = Some(Vec::new());
            }
            LdapRule::SaslAuth => match &mut top_op(objects)?.op {
                ProtocolOp::BindRequest(bind) => {
                    bind.authentication = BindAuthentication::Sasl {
                        mechanism: String::new(),
                        credentials: None,
                    }
                }
                _ => return Err(stack_error("BindRequest")),
            },
            _ => {}
        }
        Ok(())
    }

    fn value(&self, rule: LdapRule, value: Bytes, objects: &mut ObjectStack<LdapObject>) -> Result<(), DecodeError> {
        match rule {
            LdapRule::Field(f) => apply_field(f, &value, objects),
            LdapRule::Op(kind) => apply_primitive_op(kind, &value, objects),
            LdapRule::Filter(FilterKind::Present) => {
                top_leaf(objects)?.attribute = utf8_field(&value, "Filter", "present")?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn finish(&self, rule: LdapRule, state: u8, objects: &mut ObjectStack<LdapObject>) -> Result<(), DecodeError> {
        if let Some((min_state, structure, field)) = rule.completion() {
            if state < min_state {
                return Err(DecodeError::missing(structure, field));
            }
        }
        match rule {
            LdapRule::Op(_) => {
                let Some(LdapObject::Op(builder)) = objects.pop() else {
                    return Err(stack_error("protocolOp"));
                };
                top_message(objects)?.protocol_op = Some(builder.op);
            }
            LdapRule::Attribute => {
                let Some(LdapObject::Attribute(attribute)) = objects.pop() else {
                    return Err(stack_error("attribute"));
                };
                match objects.top_mut() {
                    Some(LdapObject::Change(change)) => change.modification = attribute,
                    Some(LdapObject::Op(OpBuilder {
                        op: ProtocolOp::SearchResultEntry(SearchResultEntry { attributes, .. }),
                        ..
                    }))
                    | Some(LdapObject::Op(OpBuilder {
                        op: ProtocolOp::AddRequest(AddRequest { attributes, .. }),
                        ..
                    })) => attributes.push(attribute),
                    _ => return Err(stack_error("attribute")),
                }
            }
            LdapRule::Change => {
                let Some(LdapObject::Change(change)) = objects.pop() else {
                    return Err(stack_error("change"));
                };
                match &mut top_op(objects)?.op {
                    ProtocolOp::ModifyRequest(req) => req.changes.push(change),
                    _ => return Err(stack_error("ModifyRequest")),
                }
            }
            LdapRule::Control => {
                let Some(LdapObject::Control(builder)) = objects.pop() else {
                    return Err(stack_error("control"));
                };
                let control = Control::from_parts(&builder.oid, builder.critical, builder.value.as_deref())?;
                let message = top_message(objects)?;
                match control {
                    Some(control) => message.controls.push(control),
                    None => message.skipped_controls.push(SkippedControl {
                        oid: builder.oid,
                        critical: builder.critical,
                    }),
                }
            }
            LdapRule::Filter(kind) => {
                let Some(LdapObject::Filter(filter)) = objects.pop() else {
                    return Err(stack_error("filter"));
                };
                if let (FilterKind::Extensible, Filter::Leaf(leaf)) = (kind, &filter) {
                    if let Assertion::Extensible(m) = &leaf.assertion {
                        if m.matching_rule.is_none() && leaf.attribute.is_empty() {
                            return Err(DecodeError::constraint(
                                "MatchingRuleAssertion",
                                "matchingRule",
                                "either matchingRule or type must be present",
                            ));
                        }
                    }
                }
                attach_filter(filter, objects)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn complete(&self, objects: &mut ObjectStack<LdapObject>) -> Result<LdapMessage, DecodeError> {
        let Some(LdapObject::Message(builder)) = objects.pop() else {
            return Err(stack_error("message"));
        };
        let protocol_op = builder
            .protocol_op
            .ok_or_else(|| DecodeError::missing("LDAPMessage", "protocolOp"))?;
        Ok(LdapMessage {
            message_id: builder.message_id,
            protocol_op,
            controls: builder.controls,
            skipped_controls: builder.skipped_controls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digester::CollectingHandler;

    fn decode(input: &[u8]) -> CollectingHandler<LdapMessage> {
        let mut decoder = LdapGrammar::decoder(DecoderConfig::default());
        let mut handler = CollectingHandler::new();
        decoder
            .decode(Bytes::copy_from_slice(input), &mut handler)
            .unwrap();
        handler
    }

    #[test]
    fn test_parse_bind_request_simple() {
        // LDAPMessage: SEQUENCE { messageID 1, BindRequest { version 3, name "cn=admin", simple "secret" } }
        let data = vec![
            0x30, 0x1A, 0x02, 0x01, 0x01, 0x60, 0x15, 0x02, 0x01, 0x03, 0x04, 0x08, b'c', b'n', b'=',
            b'a', b'd', b'm', b'i', b'n', 0x80, 0x06, b's', b'e', b'c', b'r', b'e', b't',
        ];
        let handler = decode(&data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        let msg = &handler.messages[0];
        assert_eq!(msg.message_id, 1);
        match &msg.protocol_op {
            ProtocolOp::BindRequest(req) => {
                assert_eq!(req.version, 3);
                assert_eq!(req.name, "cn=admin");
                assert_eq!(req.authentication, BindAuthentication::Simple(b"secret".to_vec()));
            }
            other => panic!("expected BindRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bind_request_sasl() {
        // BindRequest with SASL [3] { mechanism "PLAIN", credentials "\0u\0p" }
        let data = vec![
            0x30, 0x1A, 0x02, 0x01, 0x02, 0x60, 0x15, 0x02, 0x01, 0x03, 0x04, 0x00, 0xA3, 0x0E,
            0x04, 0x05, b'P', b'L', b'A', b'I', b'N', 0x04, 0x05, 0x00, b'u', 0x00, b'p', b'w',
        ];
        let handler = decode(&data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        match &handler.messages[0].protocol_op {
            ProtocolOp::BindRequest(req) => match &req.authentication {
                BindAuthentication::Sasl {
                    mechanism,
                    credentials,
                } => {
                    assert_eq!(mechanism, "PLAIN");
                    assert_eq!(credentials.as_deref(), Some(&b"\0u\0pw"[..]));
                }
                other => panic!("expected SASL, got {:?}", other),
            },
            other => panic!("expected BindRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field() {
        // BindRequest without authentication
        let data = vec![0x30, 0x0A, 0x02, 0x01, 0x01, 0x60, 0x05, 0x02, 0x01, 0x03, 0x04, 0x00];
        let handler = decode(&data);
        assert!(handler.messages.is_empty());
        assert_eq!(
            handler.errors,
            vec![DecodeError::missing("BindRequest", "authentication")]
        );
    }

    #[test]
    fn test_primitive_ops() {
        // DelRequest "o=x", Abandon 5, Unbind
        let data = vec![
            0x30, 0x08, 0x02, 0x01, 0x01, 0x4A, 0x03, b'o', b'=', b'x', 0x30, 0x06, 0x02, 0x01,
            0x02, 0x50, 0x01, 0x05, 0x30, 0x05, 0x02, 0x01, 0x03, 0x42, 0x00,
        ];
        let handler = decode(&data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        let ops: Vec<_> = handler.messages.iter().map(|m| m.protocol_op.clone()).collect();
        assert_eq!(
            ops,
            vec![
                ProtocolOp::DelRequest(DelRequest {
                    entry: "o=x".to_string()
                }),
                ProtocolOp::AbandonRequest(5),
                ProtocolOp::UnbindRequest,
            ]
        );
    }

    #[test]
    fn test_not_filter_with_two_children_is_rejected() {
        // SearchRequest whose filter is NOT { present cn, present sn }
        let data = vec![
            0x30, 0x22, 0x02, 0x01, 0x01, 0x63, 0x1D, 0x04, 0x00, 0x0A, 0x01, 0x00, 0x0A, 0x01,
            0x00, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x01, 0x01, 0x00, 0xA2, 0x08, 0x87, 0x02,
            b'c', b'n', 0x87, 0x02, b's', b'n', 0x30, 0x00,
        ];
        let handler = decode(&data);
        assert!(handler.messages.is_empty());
        assert_eq!(handler.errors.len(), 1);
        assert!(matches!(handler.errors[0], DecodeError::UnexpectedTag { .. }));
    }

    #[test]
    fn test_unknown_control_is_skipped() {
        // UnbindRequest with controls: ManageDsaIT (critical) and 1.2.3 (unknown, with value)
        let mut data = vec![0x30, 0x00, 0x02, 0x01, 0x07, 0x42, 0x00, 0xA0, 0x00];
        let manage = [
            0x30, 0x1C, 0x04, 0x17, b'2', b'.', b'1', b'6', b'.', b'8', b'4', b'0', b'.', b'1',
            b'.', b'1', b'1', b'3', b'7', b'3', b'0', b'.', b'3', b'.', b'4', b'.', b'2', 0x01,
            0x01, 0xFF,
        ];
        let unknown = [0x30, 0x0A, 0x04, 0x05, b'1', b'.', b'2', b'.', b'3', 0x04, 0x01, 0x00];
        data.extend_from_slice(&manage);
        data.extend_from_slice(&unknown);
        // outer lengths
        data[8] = (manage.len() + unknown.len()) as u8;
        data[1] = (data.len() - 2) as u8;

        let handler = decode(&data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        let msg = &handler.messages[0];
        assert_eq!(msg.controls, vec![Control::new(ControlKind::ManageDsaIt, true)]);
        assert_eq!(
            msg.skipped_controls,
            vec![SkippedControl {
                oid: "1.2.3".to_string(),
                critical: false
            }]
        );
    }

    #[test]
    fn test_unknown_child_in_controls_is_tolerated() {
        // Controls [0] containing an INTEGER instead of a Control SEQUENCE
        let data = vec![
            0x30, 0x0A, 0x02, 0x01, 0x07, 0x42, 0x00, 0xA0, 0x03, 0x02, 0x01, 0x01,
        ];
        let handler = decode(&data);
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        assert_eq!(handler.messages[0].protocol_op, ProtocolOp::UnbindRequest);
    }

    #[test]
    fn test_matched_dn_recorded_once() {
        let mut set = false;
        let mut slot = String::new();
        record_matched_dn(ResponseKind::Add, false, &mut set, &mut slot, "o=a".into()).unwrap();
        assert_eq!(slot, "o=a");
        let err = record_matched_dn(ResponseKind::Add, false, &mut set, &mut slot, "o=b".into())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::DomainConstraintViolation {
                structure: "AddResponse",
                field: "matchedDN",
                ..
            }
        ));
    }

    #[test]
    fn test_prepopulated_matched_dn_is_bypassed() {
        let mut set = true;
        let mut slot = "o=pre".to_string();
        record_matched_dn(ResponseKind::Bind, true, &mut set, &mut slot, "o=wire".into()).unwrap();
        assert_eq!(slot, "o=pre");
    }

    #[test]
    fn test_invalid_enumeration_is_domain_error() {
        // ModifyRequest { "", changes { Change { operation 9, { "cn", {} } } } }
        let data = vec![
            0x30, 0x16, 0x02, 0x01, 0x01, 0x66, 0x11, 0x04, 0x00, 0x30, 0x0D, 0x30, 0x0B, 0x0A,
            0x01, 0x09, 0x30, 0x06, 0x04, 0x02, b'c', b'n', 0x31, 0x00,
        ];
        let handler = decode(&data);
        assert!(handler.messages.is_empty());
        assert!(matches!(
            handler.errors[0],
            DecodeError::DomainConstraintViolation {
                structure: "ModifyRequest",
                field: "operation",
                ..
            }
        ));
    }
}
