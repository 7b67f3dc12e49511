use ber_codec::ber::BerWriter;
use ber_codec::ldap_encoder::encode_filter;
use ber_codec::ldap_protocol::*;
use ber_codec::{encode_ldap_message, CollectingHandler, DecodeError, DecoderConfig, LdapGrammar};
use bytes::Bytes;

fn decode_chunks(chunks: &[&[u8]]) -> CollectingHandler<LdapMessage> {
    let mut decoder = LdapGrammar::decoder(DecoderConfig::default());
    let mut handler = CollectingHandler::new();
    for chunk in chunks {
        decoder
            .decode(Bytes::copy_from_slice(chunk), &mut handler)
            .unwrap();
    }
    assert!(decoder.is_idle());
    handler
}

fn bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

fn search_filter() -> Filter {
    Filter::and(vec![
        Filter::or(vec![
            Filter::equality("cn", "Babs Jensen"),
            Filter::leaf("sn", Assertion::Approx(bytes("jensen"))),
        ]),
        Filter::not(Filter::present("mail")),
        Filter::leaf(
            "o",
            Assertion::Substrings(Substrings {
                initial: Some(bytes("univ")),
                any: vec![bytes("of"), bytes("mich")],
                final_value: Some(bytes("an")),
            }),
        ),
        Filter::leaf("uidNumber", Assertion::GreaterOrEqual(bytes("1000"))),
        Filter::leaf("uidNumber", Assertion::LessOrEqual(bytes("2000"))),
        Filter::leaf(
            "cn",
            Assertion::Extensible(ExtensibleMatch {
                matching_rule: Some("2.5.13.5".to_string()),
                value: bytes("Fred Flintstone"),
                dn_attributes: true,
            }),
        ),
        Filter::leaf(
            "",
            Assertion::Extensible(ExtensibleMatch {
                matching_rule: Some("caseExactMatch".to_string()),
                value: bytes("Dino"),
                dn_attributes: false,
            }),
        ),
        Filter::leaf("description", Assertion::Substrings(Substrings {
            initial: None,
            any: vec![],
            final_value: Some(bytes("*)")),
        })),
    ])
}

fn referral_result() -> LdapResult {
    LdapResult {
        result_code: 10,
        matched_dn: "dc=example,dc=com".to_string(),
        diagnostic_message: "see referral".to_string(),
        referral: Some(vec![
            "ldap://a.example.com/".to_string(),
            "ldap://b.example.com/".to_string(),
        ]),
    }
}

/// One message per operation, with OPTIONAL parts both present and absent.
fn fixtures() -> Vec<LdapMessage> {
    vec![
        LdapMessage::new(
            1,
            ProtocolOp::BindRequest(BindRequest {
                version: 3,
                name: "cn=admin,dc=example,dc=com".to_string(),
                authentication: BindAuthentication::Simple(bytes("secret")),
            }),
        )
        .with_control(Control::new(ControlKind::ManageDsaIt, true)),
        LdapMessage::new(
            2,
            ProtocolOp::BindRequest(BindRequest {
                version: 3,
                name: String::new(),
                authentication: BindAuthentication::Sasl {
                    mechanism: "EXTERNAL".to_string(),
                    credentials: None,
                },
            }),
        ),
        LdapMessage::new(
            3,
            ProtocolOp::BindRequest(BindRequest {
                version: 3,
                name: String::new(),
                authentication: BindAuthentication::Sasl {
                    mechanism: "DIGEST-MD5".to_string(),
                    credentials: Some(vec![0x00, 0x01, 0xFF]),
                },
            }),
        ),
        LdapMessage::new(
            4,
            ProtocolOp::BindResponse(BindResponse {
                result: LdapResult::success(),
                server_sasl_creds: Some(bytes("rspauth=abc")),
            }),
        ),
        LdapMessage::new(
            5,
            ProtocolOp::BindResponse(BindResponse {
                result: referral_result(),
                server_sasl_creds: None,
            }),
        ),
        LdapMessage::new(6, ProtocolOp::UnbindRequest),
        LdapMessage::new(
            7,
            ProtocolOp::SearchRequest(SearchRequest {
                base_object: "dc=example,dc=com".to_string(),
                scope: SearchScope::WholeSubtree,
                deref_aliases: DerefAliases::DerefAlways,
                size_limit: 500,
                time_limit: 30,
                types_only: false,
                filter: search_filter(),
                attributes: vec!["cn".to_string(), "mail".to_string()],
            }),
        )
        .with_control(Control::new(
            ControlKind::PagedResults(PagedResultsControl {
                size: 100,
                cookie: Vec::new(),
            }),
            false,
        ))
        .with_control(Control::new(
            ControlKind::SyncRequest(SyncRequestControl {
                mode: 3,
                cookie: Some(bytes("rid=001,csn=20240101")),
                reload_hint: true,
            }),
            true,
        )),
        LdapMessage::new(
            8,
            ProtocolOp::SearchRequest(SearchRequest {
                base_object: String::new(),
                scope: SearchScope::BaseObject,
                deref_aliases: DerefAliases::NeverDerefAliases,
                size_limit: 0,
                time_limit: 0,
                types_only: true,
                filter: Filter::present("objectClass"),
                attributes: vec![],
            }),
        )
        .with_control(Control::new(ControlKind::Subentries(false), false)),
        LdapMessage::new(
            9,
            ProtocolOp::SearchResultEntry(SearchResultEntry {
                object_name: "uid=jdoe,ou=people,dc=example,dc=com".to_string(),
                attributes: vec![
                    Attribute::new("objectClass", &["top", "person", "inetOrgPerson"]),
                    Attribute::new("cn", &["John Doe"]),
                    Attribute {
                        attr_type: "jpegPhoto".to_string(),
                        attr_values: vec![vec![0xAB; 300]],
                    },
                    Attribute::new("description", &[]),
                ],
            }),
        ),
        LdapMessage::new(
            10,
            ProtocolOp::SearchResultReference(vec![
                "ldap://hostb/OU=People,DC=Example,DC=NET??sub".to_string(),
                "ldap://hostc/OU=People,DC=Example,DC=NET??sub".to_string(),
            ]),
        ),
        LdapMessage::new(11, ProtocolOp::SearchResultDone(LdapResult::new(4, "", "size limit exceeded"))),
        LdapMessage::new(
            12,
            ProtocolOp::ModifyRequest(ModifyRequest {
                object: "uid=jdoe,ou=people,dc=example,dc=com".to_string(),
                changes: vec![
                    ModifyChange {
                        operation: ModifyOperation::Add,
                        modification: Attribute::new("mail", &["jdoe@example.com"]),
                    },
                    ModifyChange {
                        operation: ModifyOperation::Delete,
                        modification: Attribute::new("telephoneNumber", &[]),
                    },
                    ModifyChange {
                        operation: ModifyOperation::Replace,
                        modification: Attribute::new("sn", &["Doe", "Doh"]),
                    },
                    ModifyChange {
                        operation: ModifyOperation::Increment,
                        modification: Attribute::new("uidNumber", &["1"]),
                    },
                ],
            }),
        ),
        LdapMessage::new(13, ProtocolOp::ModifyResponse(LdapResult::success())),
        LdapMessage::new(
            14,
            ProtocolOp::AddRequest(AddRequest {
                entry: "cn=new,dc=example,dc=com".to_string(),
                attributes: vec![
                    Attribute::new("objectClass", &["device"]),
                    Attribute::new("cn", &["new"]),
                ],
            }),
        ),
        LdapMessage::new(15, ProtocolOp::AddResponse(LdapResult::new(68, "", "entry already exists"))),
        LdapMessage::new(
            16,
            ProtocolOp::DelRequest(DelRequest {
                entry: "cn=old,dc=example,dc=com".to_string(),
            }),
        ),
        LdapMessage::new(17, ProtocolOp::DelResponse(referral_result())),
        LdapMessage::new(
            18,
            ProtocolOp::ModifyDNRequest(ModifyDNRequest {
                entry: "cn=a,dc=example,dc=com".to_string(),
                newrdn: "cn=b".to_string(),
                delete_old_rdn: true,
                new_superior: None,
            }),
        ),
        LdapMessage::new(
            19,
            ProtocolOp::ModifyDNRequest(ModifyDNRequest {
                entry: "cn=a,dc=example,dc=com".to_string(),
                newrdn: "cn=a".to_string(),
                delete_old_rdn: false,
                new_superior: Some("ou=archive,dc=example,dc=com".to_string()),
            }),
        ),
        LdapMessage::new(20, ProtocolOp::ModifyDNResponse(LdapResult::success())),
        LdapMessage::new(
            21,
            ProtocolOp::CompareRequest(CompareRequest {
                entry: "uid=jdoe,ou=people,dc=example,dc=com".to_string(),
                attr: "employeeType".to_string(),
                assertion_value: bytes("contractor"),
            }),
        ),
        LdapMessage::new(22, ProtocolOp::CompareResponse(LdapResult::new(6, "", ""))),
        LdapMessage::new(23, ProtocolOp::AbandonRequest(7)),
        LdapMessage::new(
            24,
            ProtocolOp::ExtendedRequest(ExtendedRequest {
                request_name: "1.3.6.1.4.1.1466.20037".to_string(),
                request_value: None,
            }),
        ),
        LdapMessage::new(
            25,
            ProtocolOp::ExtendedRequest(ExtendedRequest {
                request_name: "1.3.6.1.4.1.4203.1.11.1".to_string(),
                request_value: Some(vec![0x30, 0x00]),
            }),
        ),
        LdapMessage::new(
            26,
            ProtocolOp::ExtendedResponse(ExtendedResponse {
                result: LdapResult::success(),
                response_name: Some("1.3.6.1.4.1.1466.20037".to_string()),
                response_value: Some(bytes("ok")),
            }),
        ),
        LdapMessage::new(
            27,
            ProtocolOp::ExtendedResponse(ExtendedResponse {
                result: LdapResult::new(2, "", "unsupported"),
                response_name: None,
                response_value: None,
            }),
        ),
        LdapMessage::new(
            28,
            ProtocolOp::IntermediateResponse(IntermediateResponse {
                response_name: Some("1.3.6.1.4.1.4203.1.9.1.4".to_string()),
                response_value: Some(vec![0xA0, 0x00]),
            }),
        ),
        LdapMessage::new(29, ProtocolOp::IntermediateResponse(IntermediateResponse::default())),
    ]
}

#[test]
fn test_every_operation_round_trips() {
    for message in fixtures() {
        let encoded = encode_ldap_message(&message).unwrap();
        let handler = decode_chunks(&[&encoded]);
        assert!(handler.errors.is_empty(), "{}: {:?}", message.protocol_op.name(), handler.errors);
        assert_eq!(handler.messages, vec![message]);
    }
}

#[test]
fn test_encoding_is_deterministic() {
    for message in fixtures() {
        let first = encode_ldap_message(&message).unwrap();
        let decoded = decode_chunks(&[&first]).messages.remove(0);
        assert_eq!(encode_ldap_message(&decoded).unwrap(), first);
    }
}

#[test]
fn test_stream_split_at_every_point() {
    let messages = fixtures();
    let stream: Vec<u8> = messages
        .iter()
        .flat_map(|m| encode_ldap_message(m).unwrap())
        .collect();
    for split in 0..=stream.len() {
        let handler = decode_chunks(&[&stream[..split], &stream[split..]]);
        assert!(handler.errors.is_empty(), "split {}: {:?}", split, handler.errors);
        assert_eq!(handler.messages, messages, "split {}", split);
    }
}

#[test]
fn test_three_chunks_and_single_bytes() {
    let message = fixtures().remove(6);
    let encoded = encode_ldap_message(&message).unwrap();
    for i in 0..=encoded.len() {
        for j in i..=encoded.len() {
            let handler = decode_chunks(&[&encoded[..i], &encoded[i..j], &encoded[j..]]);
            assert_eq!(handler.messages.len(), 1, "splits {} {}", i, j);
            assert_eq!(handler.messages[0], message);
        }
    }
    let singles: Vec<&[u8]> = encoded.chunks(1).collect();
    assert_eq!(decode_chunks(&singles).messages, vec![message]);
}

#[test]
fn test_long_form_lengths() {
    // the 300 byte jpegPhoto value forces two-octet lengths
    let message = fixtures().remove(8);
    let encoded = encode_ldap_message(&message).unwrap();
    assert_eq!(encoded[1], 0x82);
    assert!(encoded.windows(4).any(|w| w == [0x04, 0x82, 0x01, 0x2C]));
    assert_eq!(decode_chunks(&[&encoded]).messages, vec![message]);
}

#[test]
fn test_short_long_length_boundary() {
    let message = LdapMessage::new(
        40,
        ProtocolOp::CompareRequest(CompareRequest {
            entry: "x".repeat(127),
            attr: "cn".to_string(),
            assertion_value: vec![b'v'; 128],
        }),
    );
    let encoded = encode_ldap_message(&message).unwrap();
    assert!(encoded.windows(2).any(|w| w == [0x04, 0x7F]));
    assert!(encoded.windows(3).any(|w| w == [0x04, 0x81, 0x80]));
    for split in 0..=encoded.len() {
        let handler = decode_chunks(&[&encoded[..split], &encoded[split..]]);
        assert_eq!(handler.messages, vec![message.clone()], "split {}", split);
    }
}

#[test]
fn test_non_minimal_length_accepted() {
    // UnbindRequest with the outer length in five octets
    let data = [0x30, 0x84, 0x00, 0x00, 0x00, 0x05, 0x02, 0x01, 0x09, 0x42, 0x00];
    let handler = decode_chunks(&[&data]);
    assert_eq!(handler.messages, vec![LdapMessage::new(9, ProtocolOp::UnbindRequest)]);
}

#[test]
fn test_indefinite_length_message() {
    // SearchResultDone inside an indefinite-length LDAPMessage
    let data = [
        0x30, 0x80, 0x02, 0x01, 0x04, 0x65, 0x07, 0x0A, 0x01, 0x00, 0x04, 0x00, 0x04, 0x00, 0x00, 0x00,
    ];
    let handler = decode_chunks(&[&data]);
    assert_eq!(
        handler.messages,
        vec![LdapMessage::new(4, ProtocolOp::SearchResultDone(LdapResult::success()))]
    );
}

fn search_with_unknown_control() -> Vec<u8> {
    let mut w = BerWriter::new();
    w.write_sequence(|w| {
        w.write_integer(31);
        w.write_constructed(LDAP_TAG_SEARCH_REQUEST, |w| {
            w.write_string("dc=example,dc=com");
            w.write_enumerated(2);
            w.write_enumerated(0);
            w.write_integer(0);
            w.write_integer(0);
            w.write_boolean(false);
            encode_filter(w, &Filter::equality("uid", "jdoe")).unwrap();
            w.write_sequence(|_| {});
        });
        w.write_constructed(LDAP_CONTEXT_CONTROLS, |w| {
            w.write_sequence(|w| {
                w.write_string(MANAGE_DSA_IT_OID);
                w.write_boolean(true);
            });
            w.write_sequence(|w| {
                w.write_string("1.2.3.4.5.6.7");
                w.write_boolean(true);
                w.write_octet_string(&[0x30, 0x03, 0x02, 0x01, 0x05]);
            });
        });
    });
    w.into_vec()
}

#[test]
fn test_unregistered_control_is_skipped() {
    let handler = decode_chunks(&[&search_with_unknown_control()]);
    assert!(handler.errors.is_empty(), "{:?}", handler.errors);
    let message = &handler.messages[0];
    assert_eq!(message.controls, vec![Control::new(ControlKind::ManageDsaIt, true)]);
    assert_eq!(
        message.skipped_controls,
        vec![SkippedControl {
            oid: "1.2.3.4.5.6.7".to_string(),
            critical: true,
        }]
    );
    match &message.protocol_op {
        ProtocolOp::SearchRequest(req) => assert_eq!(req.filter, Filter::equality("uid", "jdoe")),
        other => panic!("unexpected {:?}", other),
    }

    // skipped controls are not re-encoded
    let reencoded = encode_ldap_message(message).unwrap();
    let again = decode_chunks(&[&reencoded]).messages.remove(0);
    assert!(again.skipped_controls.is_empty());
    assert_eq!(again.controls, message.controls);
}

#[test]
fn test_message_error_then_valid_message() {
    // ModifyRequest with operation 9, then an UnbindRequest
    let bad = [
        0x30, 0x16, 0x02, 0x01, 0x01, 0x66, 0x11, 0x04, 0x00, 0x30, 0x0D, 0x30, 0x0B, 0x0A, 0x01,
        0x09, 0x30, 0x06, 0x04, 0x02, b'c', b'n', 0x31, 0x00,
    ];
    let good = encode_ldap_message(&LdapMessage::new(2, ProtocolOp::UnbindRequest)).unwrap();
    let mut stream = bad.to_vec();
    stream.extend_from_slice(&good);

    let handler = decode_chunks(&[&stream]);
    assert_eq!(handler.errors.len(), 1);
    assert!(matches!(
        handler.errors[0],
        DecodeError::DomainConstraintViolation { field: "operation", .. }
    ));
    assert_eq!(handler.messages, vec![LdapMessage::new(2, ProtocolOp::UnbindRequest)]);
}

#[test]
fn test_framing_error_resets_decoder() {
    let mut decoder = LdapGrammar::decoder(DecoderConfig::default());
    let mut handler = CollectingHandler::new();
    let err = decoder
        .decode(Bytes::from_static(&[0x30, 0xFF]), &mut handler)
        .unwrap_err();
    assert!(err.is_connection_fatal());
    assert!(decoder.is_idle());

    let good = encode_ldap_message(&LdapMessage::new(3, ProtocolOp::AbandonRequest(2))).unwrap();
    decoder.decode(Bytes::from(good), &mut handler).unwrap();
    assert_eq!(handler.messages, vec![LdapMessage::new(3, ProtocolOp::AbandonRequest(2))]);
}

#[test]
fn test_unencodable_filters() {
    let mut message = fixtures().remove(7);
    if let ProtocolOp::SearchRequest(req) = &mut message.protocol_op {
        req.filter = Filter::Branch(Branch {
            op: BranchOp::Not,
            children: vec![],
        });
    }
    assert!(encode_ldap_message(&message).is_err());
}
