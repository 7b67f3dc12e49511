// LDAPv3 DER encoding

use crate::ber::BerWriter;
use crate::error::EncodeError;
use crate::ldap_protocol::*;
use crate::tlv::Tag;

type Result<T> = std::result::Result<T, EncodeError>;

pub fn encode_ldap_message(message: &LdapMessage) -> Result<Vec<u8>> {
    let mut writer = BerWriter::new();

    // LDAPMessage ::= SEQUENCE { messageID, protocolOp, controls [0] OPTIONAL }
    writer.try_write_constructed(Tag::SEQUENCE, |w| {
        w.write_integer(message.message_id as i64);
        encode_protocol_op(w, &message.protocol_op)?;
        if !message.controls.is_empty() {
            w.write_constructed(LDAP_CONTEXT_CONTROLS, |w| {
                for control in &message.controls {
                    encode_control(w, control);
                }
            });
        }
        Ok(())
    })?;

    Ok(writer.into_vec())
}

fn encode_protocol_op(writer: &mut BerWriter, op: &ProtocolOp) -> Result<()> {
    match op {
        ProtocolOp::BindRequest(req) => encode_bind_request(writer, req),
        ProtocolOp::BindResponse(resp) => {
            writer.write_constructed(LDAP_TAG_BIND_RESPONSE, |w| {
                encode_ldap_result(w, &resp.result);
                if let Some(creds) = &resp.server_sasl_creds {
                    w.write_primitive(LDAP_CONTEXT_SERVER_SASL_CREDS, creds);
                }
            });
            Ok(())
        }
        ProtocolOp::UnbindRequest => {
            writer.write_null_tagged(LDAP_TAG_UNBIND_REQUEST);
            Ok(())
        }
        ProtocolOp::SearchRequest(req) => encode_search_request(writer, req),
        ProtocolOp::SearchResultEntry(entry) => {
            encode_entry(writer, LDAP_TAG_SEARCH_RESULT_ENTRY, &entry.object_name, &entry.attributes);
            Ok(())
        }
        ProtocolOp::SearchResultReference(uris) => {
            if uris.is_empty() {
                return Err(EncodeError::InvalidValue {
                    structure: "SearchResultReference",
                    reason: "at least one URI is required".to_string(),
                });
            }
            writer.write_constructed(LDAP_TAG_SEARCH_RESULT_REFERENCE, |w| {
                for uri in uris {
                    w.write_string(uri);
                }
            });
            Ok(())
        }
        ProtocolOp::SearchResultDone(result) => encode_result_op(writer, LDAP_TAG_SEARCH_RESULT_DONE, result),
        ProtocolOp::ModifyRequest(req) => {
            writer.write_constructed(LDAP_TAG_MODIFY_REQUEST, |w| {
                w.write_string(&req.object);
                w.write_sequence(|w| {
                    for change in &req.changes {
                        w.write_sequence(|w| {
                            w.write_enumerated(change.operation as i64);
                            encode_attribute(w, &change.modification);
                        });
                    }
                });
            });
            Ok(())
        }
        ProtocolOp::ModifyResponse(result) => encode_result_op(writer, LDAP_TAG_MODIFY_RESPONSE, result),
        ProtocolOp::AddRequest(req) => {
            encode_entry(writer, LDAP_TAG_ADD_REQUEST, &req.entry, &req.attributes);
            Ok(())
        }
        ProtocolOp::AddResponse(result) => encode_result_op(writer, LDAP_TAG_ADD_RESPONSE, result),
        ProtocolOp::DelRequest(req) => {
            writer.write_primitive(LDAP_TAG_DEL_REQUEST, req.entry.as_bytes());
            Ok(())
        }
        ProtocolOp::DelResponse(result) => encode_result_op(writer, LDAP_TAG_DEL_RESPONSE, result),
        ProtocolOp::ModifyDNRequest(req) => {
            writer.write_constructed(LDAP_TAG_MODIFY_DN_REQUEST, |w| {
                w.write_string(&req.entry);
                w.write_string(&req.newrdn);
                w.write_boolean(req.delete_old_rdn);
                if let Some(superior) = &req.new_superior {
                    w.write_primitive(LDAP_CONTEXT_NEW_SUPERIOR, superior.as_bytes());
                }
            });
            Ok(())
        }
        ProtocolOp::ModifyDNResponse(result) => encode_result_op(writer, LDAP_TAG_MODIFY_DN_RESPONSE, result),
        ProtocolOp::CompareRequest(req) => {
            writer.write_constructed(LDAP_TAG_COMPARE_REQUEST, |w| {
                w.write_string(&req.entry);
                w.write_sequence(|w| {
                    w.write_string(&req.attr);
                    w.write_octet_string(&req.assertion_value);
                });
            });
            Ok(())
        }
        ProtocolOp::CompareResponse(result) => encode_result_op(writer, LDAP_TAG_COMPARE_RESPONSE, result),
        ProtocolOp::AbandonRequest(id) => {
            writer.write_integer_tagged(LDAP_TAG_ABANDON_REQUEST, *id as i64);
            Ok(())
        }
        ProtocolOp::ExtendedRequest(req) => {
            writer.write_constructed(LDAP_TAG_EXTENDED_REQUEST, |w| {
                w.write_primitive(LDAP_CONTEXT_NAME, req.request_name.as_bytes());
                if let Some(value) = &req.request_value {
                    w.write_primitive(LDAP_CONTEXT_VALUE, value);
                }
            });
            Ok(())
        }
        ProtocolOp::ExtendedResponse(resp) => {
            writer.write_constructed(LDAP_TAG_EXTENDED_RESPONSE, |w| {
                encode_ldap_result(w, &resp.result);
                if let Some(name) = &resp.response_name {
                    w.write_primitive(LDAP_CONTEXT_EXTENDED_RESPONSE_NAME, name.as_bytes());
                }
                if let Some(value) = &resp.response_value {
                    w.write_primitive(LDAP_CONTEXT_EXTENDED_RESPONSE_VALUE, value);
                }
            });
            Ok(())
        }
        ProtocolOp::IntermediateResponse(resp) => {
            writer.write_constructed(LDAP_TAG_INTERMEDIATE_RESPONSE, |w| {
                if let Some(name) = &resp.response_name {
                    w.write_primitive(LDAP_CONTEXT_NAME, name.as_bytes());
                }
                if let Some(value) = &resp.response_value {
                    w.write_primitive(LDAP_CONTEXT_VALUE, value);
                }
            });
            Ok(())
        }
    }
}

fn encode_bind_request(writer: &mut BerWriter, req: &BindRequest) -> Result<()> {
    writer.write_constructed(LDAP_TAG_BIND_REQUEST, |w| {
        w.write_integer(req.version as i64);
        w.write_string(&req.name);
        match &req.authentication {
            BindAuthentication::Simple(password) => w.write_primitive(LDAP_CONTEXT_SIMPLE_AUTH, password),
            BindAuthentication::Sasl {
                mechanism,
                credentials,
            } => w.write_constructed(LDAP_CONTEXT_SASL_AUTH, |w| {
                w.write_string(mechanism);
                if let Some(credentials) = credentials {
                    w.write_octet_string(credentials);
                }
            }),
        }
    });
    Ok(())
}

fn encode_search_request(writer: &mut BerWriter, req: &SearchRequest) -> Result<()> {
    writer.try_write_constructed(LDAP_TAG_SEARCH_REQUEST, |w| {
        w.write_string(&req.base_object);
        w.write_enumerated(req.scope as i64);
        w.write_enumerated(req.deref_aliases as i64);
        w.write_integer(req.size_limit as i64);
        w.write_integer(req.time_limit as i64);
        w.write_boolean(req.types_only);
        encode_filter(w, &req.filter)?;
        w.write_sequence(|w| {
            for attr in &req.attributes {
                w.write_string(attr);
            }
        });
        Ok(())
    })
}

/// Encode one filter node and its subtree.
pub fn encode_filter(writer: &mut BerWriter, filter: &Filter) -> Result<()> {
    match filter {
        Filter::Branch(branch) => {
            let tag = match branch.op {
                BranchOp::And => FILTER_AND,
                BranchOp::Or => FILTER_OR,
                BranchOp::Not => {
                    if branch.children.len() != 1 {
                        return Err(EncodeError::InvalidFilter(format!(
                            "NOT must have exactly one child, found {}",
                            branch.children.len()
                        )));
                    }
                    FILTER_NOT
                }
            };
            writer.try_write_constructed(tag, |w| {
                for child in &branch.children {
                    encode_filter(w, child)?;
                }
                Ok(())
            })
        }
        Filter::Leaf(leaf) => encode_leaf(writer, leaf),
    }
}

fn encode_leaf(writer: &mut BerWriter, leaf: &Leaf) -> Result<()> {
    let is_extensible = matches!(leaf.assertion, Assertion::Extensible(_));
    if leaf.attribute.is_empty() && !is_extensible {
        return Err(EncodeError::InvalidFilter(
            "filter item without an attribute description".to_string(),
        ));
    }
    let ava = |writer: &mut BerWriter, tag: Tag, value: &[u8]| {
        writer.write_constructed(tag, |w| {
            w.write_string(&leaf.attribute);
            w.write_octet_string(value);
        });
    };
    match &leaf.assertion {
        Assertion::Equality(v) => ava(writer, FILTER_EQUALITY, v),
        Assertion::GreaterOrEqual(v) => ava(writer, FILTER_GREATER_OR_EQUAL, v),
        Assertion::LessOrEqual(v) => ava(writer, FILTER_LESS_OR_EQUAL, v),
        Assertion::Approx(v) => ava(writer, FILTER_APPROX, v),
        Assertion::Present => writer.write_primitive(FILTER_PRESENT, leaf.attribute.as_bytes()),
        Assertion::Substrings(s) => {
            if s.initial.is_none() && s.any.is_empty() && s.final_value.is_none() {
                return Err(EncodeError::InvalidFilter(format!(
                    "substrings filter on '{}' has no substrings",
                    leaf.attribute
                )));
            }
            writer.write_constructed(FILTER_SUBSTRINGS, |w| {
                w.write_string(&leaf.attribute);
                w.write_sequence(|w| {
                    if let Some(initial) = &s.initial {
                        w.write_primitive(SUBSTRING_INITIAL, initial);
                    }
                    for any in &s.any {
                        w.write_primitive(SUBSTRING_ANY, any);
                    }
                    if let Some(fin) = &s.final_value {
                        w.write_primitive(SUBSTRING_FINAL, fin);
                    }
                });
            });
        }
        Assertion::Extensible(m) => {
            if m.matching_rule.is_none() && leaf.attribute.is_empty() {
                return Err(EncodeError::InvalidFilter(
                    "extensible match needs a matching rule or a type".to_string(),
                ));
            }
            writer.write_constructed(FILTER_EXTENSIBLE, |w| {
                if let Some(rule) = &m.matching_rule {
                    w.write_primitive(MATCHING_RULE, rule.as_bytes());
                }
                if !leaf.attribute.is_empty() {
                    w.write_primitive(MATCHING_TYPE, leaf.attribute.as_bytes());
                }
                w.write_primitive(MATCHING_VALUE, &m.value);
                // dnAttributes is DEFAULT FALSE
                if m.dn_attributes {
                    w.write_primitive(MATCHING_DN_ATTRIBUTES, &[0xFF]);
                }
            });
        }
    }
    Ok(())
}

fn encode_ldap_result(writer: &mut BerWriter, result: &LdapResult) {
    writer.write_enumerated(result.result_code as i64);
    writer.write_string(&result.matched_dn);
    writer.write_string(&result.diagnostic_message);
    if let Some(referral) = &result.referral {
        writer.write_constructed(LDAP_CONTEXT_REFERRAL, |w| {
            for uri in referral {
                w.write_string(uri);
            }
        });
    }
}

fn encode_result_op(writer: &mut BerWriter, tag: Tag, result: &LdapResult) -> Result<()> {
    writer.write_constructed(tag, |w| encode_ldap_result(w, result));
    Ok(())
}

fn encode_entry(writer: &mut BerWriter, tag: Tag, dn: &str, attributes: &[Attribute]) {
    writer.write_constructed(tag, |w| {
        w.write_string(dn);
        w.write_sequence(|w| {
            for attr in attributes {
                encode_attribute(w, attr);
            }
        });
    });
}

fn encode_attribute(writer: &mut BerWriter, attr: &Attribute) {
    writer.write_sequence(|w| {
        w.write_string(&attr.attr_type);
        w.write_constructed(Tag::SET, |w| {
            for value in &attr.attr_values {
                w.write_octet_string(value);
            }
        });
    });
}

fn encode_control(writer: &mut BerWriter, control: &Control) {
    writer.write_sequence(|w| {
        w.write_string(control.oid());
        // criticality is DEFAULT FALSE
        if control.critical {
            w.write_boolean(true);
        }
        if let Some(value) = control.encoded_value() {
            w.write_octet_string(&value);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bind_response() {
        let message = LdapMessage::new(
            1,
            ProtocolOp::BindResponse(BindResponse {
                result: LdapResult::success(),
                server_sasl_creds: None,
            }),
        );
        let encoded = encode_ldap_message(&message).unwrap();
        assert_eq!(
            encoded,
            vec![0x30, 0x0C, 0x02, 0x01, 0x01, 0x61, 0x07, 0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00]
        );
    }

    #[test]
    fn test_encode_search_result_done() {
        let message = LdapMessage::new(
            2,
            ProtocolOp::SearchResultDone(LdapResult::new(32, "dc=example,dc=com", "")),
        );
        let encoded = encode_ldap_message(&message).unwrap();
        assert_eq!(encoded[0], 0x30);
        assert_eq!(encoded[5], 0x65);
        assert_eq!(encoded[7..10], [0x0A, 0x01, 0x20]);
    }

    #[test]
    fn test_encode_search_result_entry() {
        let message = LdapMessage::new(
            3,
            ProtocolOp::SearchResultEntry(SearchResultEntry {
                object_name: "cn=test".to_string(),
                attributes: vec![Attribute::new("cn", &["test"])],
            }),
        );
        let encoded = encode_ldap_message(&message).unwrap();
        assert_eq!(encoded[5], 0x64);
        // PartialAttribute values are a SET
        assert!(encoded.windows(2).any(|w| w == [0x31, 0x06]));
    }

    #[test]
    fn test_encode_unbind_and_abandon() {
        let encoded = encode_ldap_message(&LdapMessage::new(4, ProtocolOp::UnbindRequest)).unwrap();
        assert_eq!(encoded, vec![0x30, 0x05, 0x02, 0x01, 0x04, 0x42, 0x00]);
        let encoded = encode_ldap_message(&LdapMessage::new(5, ProtocolOp::AbandonRequest(200))).unwrap();
        assert_eq!(encoded, vec![0x30, 0x07, 0x02, 0x01, 0x05, 0x50, 0x02, 0x00, 0xC8]);
    }

    #[test]
    fn test_encode_controls_omits_default_criticality() {
        let message = LdapMessage::new(6, ProtocolOp::UnbindRequest)
            .with_control(Control::new(ControlKind::Subentries(true), false));
        let encoded = encode_ldap_message(&message).unwrap();
        let tail = &encoded[7..];
        assert_eq!(tail[0], 0xA0);
        // SEQUENCE { OID, OCTET STRING { BOOLEAN TRUE } }, no criticality
        assert_eq!(tail[2], 0x30);
        assert_eq!(tail[4], 0x04);
        assert_eq!(tail[5] as usize, SUBENTRIES_OID.len());
        assert_eq!(tail[6 + SUBENTRIES_OID.len()], 0x04);
        assert!(tail.ends_with(&[0x04, 0x03, 0x01, 0x01, 0xFF]));
    }

    #[test]
    fn test_not_with_two_children_is_unencodable() {
        let filter = Filter::Branch(Branch {
            op: BranchOp::Not,
            children: vec![Filter::present("cn"), Filter::present("sn")],
        });
        let mut writer = BerWriter::new();
        assert!(matches!(
            encode_filter(&mut writer, &filter),
            Err(EncodeError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_leaf_without_attribute_is_unencodable() {
        let mut writer = BerWriter::new();
        assert!(encode_filter(&mut writer, &Filter::present("")).is_err());
    }

    #[test]
    fn test_encode_filter_bytes() {
        // (&(cn=a)(!(sn=*)))
        let filter = Filter::and(vec![
            Filter::equality("cn", "a"),
            Filter::not(Filter::present("sn")),
        ]);
        let mut writer = BerWriter::new();
        encode_filter(&mut writer, &filter).unwrap();
        assert_eq!(
            writer.into_vec(),
            vec![
                0xA0, 0x0F, 0xA3, 0x07, 0x04, 0x02, b'c', b'n', 0x04, 0x01, b'a', 0xA2, 0x04, 0x87,
                0x02, b's', b'n',
            ]
        );
    }
}
