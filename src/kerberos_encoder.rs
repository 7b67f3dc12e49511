// Kerberos DER encoding. Every field is wrapped in its explicit [n] tag;
// absent OPTIONAL fields emit nothing.

use crate::ber::BerWriter;
use crate::kerberos::*;
use crate::tlv::Tag;

fn explicit<F>(w: &mut BerWriter, n: u32, f: F)
where
    F: FnOnce(&mut BerWriter),
{
    w.write_constructed(Tag::context_constructed(n), f);
}

fn explicit_int(w: &mut BerWriter, n: u32, value: i64) {
    explicit(w, n, |w| w.write_integer(value));
}

fn explicit_octets(w: &mut BerWriter, n: u32, value: &[u8]) {
    explicit(w, n, |w| w.write_octet_string(value));
}

fn explicit_string(w: &mut BerWriter, n: u32, value: &str) {
    explicit(w, n, |w| w.write_primitive(Tag::GENERAL_STRING, value.as_bytes()));
}

fn explicit_time(w: &mut BerWriter, n: u32, value: &KerberosTime) {
    explicit(w, n, |w| {
        w.write_primitive(Tag::GENERALIZED_TIME, value.to_generalized_time().as_bytes())
    });
}

/// `{type [0] Int32, data [1] OCTET STRING}`
fn write_typed_data(w: &mut BerWriter, data_type: i32, data: &[u8]) {
    w.write_sequence(|w| {
        explicit_int(w, 0, data_type as i64);
        explicit_octets(w, 1, data);
    });
}

fn write_principal_name(w: &mut BerWriter, name: &PrincipalName) {
    w.write_sequence(|w| {
        explicit_int(w, 0, name.name_type as i64);
        explicit(w, 1, |w| {
            w.write_sequence(|w| {
                for component in &name.name_string {
                    w.write_primitive(Tag::GENERAL_STRING, component.as_bytes());
                }
            })
        });
    });
}

fn write_encrypted_data(w: &mut BerWriter, data: &EncryptedData) {
    w.write_sequence(|w| {
        explicit_int(w, 0, data.etype as i64);
        if let Some(kvno) = data.kvno {
            explicit_int(w, 1, kvno as i64);
        }
        explicit_octets(w, 2, &data.cipher);
    });
}

fn write_host_addresses(w: &mut BerWriter, addresses: &[HostAddress]) {
    w.write_sequence(|w| {
        for a in addresses {
            write_typed_data(w, a.addr_type, &a.address);
        }
    });
}

fn write_authorization_data(w: &mut BerWriter, entries: &[AuthorizationDataEntry]) {
    w.write_sequence(|w| {
        for e in entries {
            write_typed_data(w, e.ad_type, &e.ad_data);
        }
    });
}

fn write_last_req_entry(w: &mut BerWriter, entry: &LastReqEntry) {
    w.write_sequence(|w| {
        explicit_int(w, 0, entry.lr_type as i64);
        explicit_time(w, 1, &entry.lr_value);
    });
}

fn write_ticket(w: &mut BerWriter, ticket: &Ticket) {
    w.write_constructed(Tag::application(1), |w| {
        w.write_sequence(|w| {
            explicit_int(w, 0, ticket.tkt_vno as i64);
            explicit_string(w, 1, &ticket.realm);
            explicit(w, 2, |w| write_principal_name(w, &ticket.sname));
            explicit(w, 3, |w| write_encrypted_data(w, &ticket.enc_part));
        })
    });
}

fn write_enc_ticket_part(w: &mut BerWriter, part: &EncTicketPart) {
    w.write_constructed(Tag::application(3), |w| {
        w.write_sequence(|w| {
            explicit(w, 0, |w| w.write_primitive(Tag::BIT_STRING, &part.flags.to_bit_string()));
            explicit(w, 1, |w| write_typed_data(w, part.key.key_type, &part.key.key_value));
            explicit_string(w, 2, &part.crealm);
            explicit(w, 3, |w| write_principal_name(w, &part.cname));
            explicit(w, 4, |w| {
                write_typed_data(w, part.transited.tr_type, &part.transited.contents)
            });
            explicit_time(w, 5, &part.auth_time);
            if let Some(start) = &part.start_time {
                explicit_time(w, 6, start);
            }
            explicit_time(w, 7, &part.end_time);
            if let Some(renew) = &part.renew_till {
                explicit_time(w, 8, renew);
            }
            if let Some(caddr) = &part.caddr {
                explicit(w, 9, |w| write_host_addresses(w, caddr));
            }
            if let Some(data) = &part.authorization_data {
                explicit(w, 10, |w| write_authorization_data(w, data));
            }
        })
    });
}

fn write_change_passwd_data(w: &mut BerWriter, data: &ChangePasswdData) {
    w.write_sequence(|w| {
        explicit_octets(w, 0, &data.new_passwd);
        if let Some(name) = &data.targ_name {
            explicit(w, 1, |w| write_principal_name(w, name));
        }
        if let Some(realm) = &data.targ_realm {
            explicit_string(w, 2, realm);
        }
    });
}

fn encode_with<F: FnOnce(&mut BerWriter)>(f: F) -> Vec<u8> {
    let mut writer = BerWriter::new();
    f(&mut writer);
    writer.into_vec()
}

pub fn encode_principal_name(name: &PrincipalName) -> Vec<u8> {
    encode_with(|w| write_principal_name(w, name))
}

pub fn encode_encryption_key(key: &EncryptionKey) -> Vec<u8> {
    encode_with(|w| write_typed_data(w, key.key_type, &key.key_value))
}

pub fn encode_checksum(checksum: &Checksum) -> Vec<u8> {
    encode_with(|w| write_typed_data(w, checksum.cksum_type, &checksum.checksum))
}

pub fn encode_encrypted_data(data: &EncryptedData) -> Vec<u8> {
    encode_with(|w| write_encrypted_data(w, data))
}

pub fn encode_transited_encoding(transited: &TransitedEncoding) -> Vec<u8> {
    encode_with(|w| write_typed_data(w, transited.tr_type, &transited.contents))
}

pub fn encode_host_address(address: &HostAddress) -> Vec<u8> {
    encode_with(|w| write_typed_data(w, address.addr_type, &address.address))
}

pub fn encode_host_addresses(addresses: &[HostAddress]) -> Vec<u8> {
    encode_with(|w| write_host_addresses(w, addresses))
}

pub fn encode_authorization_data(entries: &[AuthorizationDataEntry]) -> Vec<u8> {
    encode_with(|w| write_authorization_data(w, entries))
}

pub fn encode_last_req(entries: &[LastReqEntry]) -> Vec<u8> {
    encode_with(|w| {
        w.write_sequence(|w| {
            for e in entries {
                write_last_req_entry(w, e);
            }
        })
    })
}

pub fn encode_ticket(ticket: &Ticket) -> Vec<u8> {
    encode_with(|w| write_ticket(w, ticket))
}

pub fn encode_enc_ticket_part(part: &EncTicketPart) -> Vec<u8> {
    encode_with(|w| write_enc_ticket_part(w, part))
}

pub fn encode_change_passwd_data(data: &ChangePasswdData) -> Vec<u8> {
    encode_with(|w| write_change_passwd_data(w, data))
}

pub fn encode_kerberos_value(value: &KerberosValue) -> Vec<u8> {
    match value {
        KerberosValue::PrincipalName(v) => encode_principal_name(v),
        KerberosValue::EncryptionKey(v) => encode_encryption_key(v),
        KerberosValue::Checksum(v) => encode_checksum(v),
        KerberosValue::EncryptedData(v) => encode_encrypted_data(v),
        KerberosValue::TransitedEncoding(v) => encode_transited_encoding(v),
        KerberosValue::HostAddress(v) => encode_host_address(v),
        KerberosValue::HostAddresses(v) => encode_host_addresses(v),
        KerberosValue::AuthorizationData(v) => encode_authorization_data(v),
        KerberosValue::AuthorizationDataEntry(v) => encode_with(|w| write_typed_data(w, v.ad_type, &v.ad_data)),
        KerberosValue::LastReq(v) => encode_last_req(v),
        KerberosValue::LastReqEntry(v) => encode_with(|w| write_last_req_entry(w, v)),
        KerberosValue::Ticket(v) => encode_ticket(v),
        KerberosValue::EncTicketPart(v) => encode_enc_ticket_part(v),
        KerberosValue::ChangePasswdData(v) => encode_change_passwd_data(v),
    }
}
