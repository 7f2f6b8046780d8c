//! WebDAV access control lists (RFC 3744): ACE model, `<acl>` fragment
//! parser, and `ACL` request-body serialization.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{DavError, DavResult};
use crate::webdav::xml::escape_xml;

/// The subject an ACE applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclPrincipal {
    Href(String),
    All,
    Authenticated,
    Unauthenticated,
    SelfPrincipal,
    /// `<property><owner/></property>` style indirection; carries the
    /// property's local name.
    Property(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Read,
    Write,
    WriteProperties,
    WriteContent,
    Unlock,
    ReadAcl,
    ReadCurrentUserPrivilegeSet,
    WriteAcl,
    Bind,
    Unbind,
    All,
}

impl Privilege {
    pub fn from_local_name(name: &[u8]) -> Option<Self> {
        if name.eq_ignore_ascii_case(b"read") {
            Some(Self::Read)
        } else if name.eq_ignore_ascii_case(b"write") {
            Some(Self::Write)
        } else if name.eq_ignore_ascii_case(b"write-properties") {
            Some(Self::WriteProperties)
        } else if name.eq_ignore_ascii_case(b"write-content") {
            Some(Self::WriteContent)
        } else if name.eq_ignore_ascii_case(b"unlock") {
            Some(Self::Unlock)
        } else if name.eq_ignore_ascii_case(b"read-acl") {
            Some(Self::ReadAcl)
        } else if name.eq_ignore_ascii_case(b"read-current-user-privilege-set") {
            Some(Self::ReadCurrentUserPrivilegeSet)
        } else if name.eq_ignore_ascii_case(b"write-acl") {
            Some(Self::WriteAcl)
        } else if name.eq_ignore_ascii_case(b"bind") {
            Some(Self::Bind)
        } else if name.eq_ignore_ascii_case(b"unbind") {
            Some(Self::Unbind)
        } else if name.eq_ignore_ascii_case(b"all") {
            Some(Self::All)
        } else {
            None
        }
    }

    pub fn xml_name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::WriteProperties => "write-properties",
            Self::WriteContent => "write-content",
            Self::Unlock => "unlock",
            Self::ReadAcl => "read-acl",
            Self::ReadCurrentUserPrivilegeSet => "read-current-user-privilege-set",
            Self::WriteAcl => "write-acl",
            Self::Bind => "bind",
            Self::Unbind => "unbind",
            Self::All => "all",
        }
    }
}

/// One access control entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Ace {
    pub principal: AclPrincipal,
    pub grant: Vec<Privilege>,
    pub deny: Vec<Privilege>,
    /// Href of the resource this ACE is inherited from, when protected by
    /// the server.
    pub inherited: Option<String>,
}

impl Ace {
    pub fn grant(principal: AclPrincipal, privileges: Vec<Privilege>) -> Self {
        Self {
            principal,
            grant: privileges,
            deny: Vec::new(),
            inherited: None,
        }
    }
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AclSection {
    None,
    Principal,
    PrincipalProperty,
    Grant,
    Deny,
    Inherited,
}

/// Parse a standalone `<acl>` XML fragment (namespace prefixes arbitrary).
pub fn parse_acl(body: &[u8]) -> DavResult<Vec<Ace>> {
    let mut xml = Reader::from_reader(body);
    xml.config_mut().trim_text(true);

    let mut aces: Vec<Ace> = Vec::new();
    let mut current: Option<Ace> = None;
    let mut section = AclSection::None;
    let mut in_href = false;
    let mut saw_acl = false;
    let mut buf = Vec::with_capacity(1024);

    loop {
        let event = xml
            .read_event_into(&mut buf)
            .map_err(|e| DavError::parse(format!("acl xml: {e}")))?;
        let is_empty = matches!(&event, Event::Empty(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let local = local_name(e.name().as_ref()).to_ascii_lowercase();
                match local.as_slice() {
                    b"acl" => saw_acl = true,
                    b"ace" => {
                        current = Some(Ace {
                            principal: AclPrincipal::All,
                            grant: Vec::new(),
                            deny: Vec::new(),
                            inherited: None,
                        });
                        section = AclSection::None;
                    }
                    b"principal" if !is_empty => section = AclSection::Principal,
                    b"grant" if !is_empty => section = AclSection::Grant,
                    b"deny" if !is_empty => section = AclSection::Deny,
                    b"inherited" if !is_empty => section = AclSection::Inherited,
                    b"href" => in_href = true,
                    b"property" if section == AclSection::Principal => {
                        section = AclSection::PrincipalProperty;
                    }
                    b"privilege" => {}
                    other => {
                        if let Some(ace) = current.as_mut() {
                            match section {
                                AclSection::Principal => {
                                    ace.principal = match other {
                                        b"all" => AclPrincipal::All,
                                        b"authenticated" => AclPrincipal::Authenticated,
                                        b"unauthenticated" => AclPrincipal::Unauthenticated,
                                        b"self" => AclPrincipal::SelfPrincipal,
                                        _ => ace.principal.clone(),
                                    };
                                }
                                AclSection::PrincipalProperty => {
                                    ace.principal = AclPrincipal::Property(
                                        String::from_utf8_lossy(&local).into_owned(),
                                    );
                                }
                                AclSection::Grant => {
                                    if let Some(p) = Privilege::from_local_name(other) {
                                        ace.grant.push(p);
                                    }
                                }
                                AclSection::Deny => {
                                    if let Some(p) = Privilege::from_local_name(other) {
                                        ace.deny.push(p);
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
                if is_empty && local == b"href" {
                    in_href = false;
                }
            }
            Event::Text(ref e) => {
                if in_href && let Some(ace) = current.as_mut() {
                    let text = std::str::from_utf8(e.as_ref())
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    if !text.is_empty() {
                        match section {
                            AclSection::Principal => {
                                ace.principal = AclPrincipal::Href(text);
                            }
                            AclSection::Inherited => ace.inherited = Some(text),
                            _ => {}
                        }
                    }
                }
            }
            Event::End(ref e) => {
                let local = local_name(e.name().as_ref()).to_ascii_lowercase();
                match local.as_slice() {
                    b"ace" => {
                        if let Some(ace) = current.take() {
                            aces.push(ace);
                        }
                        section = AclSection::None;
                    }
                    b"principal" | b"grant" | b"deny" | b"inherited" => {
                        section = AclSection::None;
                    }
                    b"property" => {
                        if section == AclSection::PrincipalProperty {
                            section = AclSection::Principal;
                        }
                    }
                    b"href" => in_href = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_acl {
        return Err(DavError::parse("document contains no acl element"));
    }
    Ok(aces)
}

fn write_privileges(out: &mut String, tag: &str, privileges: &[Privilege]) {
    if privileges.is_empty() {
        return;
    }
    out.push_str(&format!("<D:{tag}>"));
    for privilege in privileges {
        out.push_str("<D:privilege><D:");
        out.push_str(privilege.xml_name());
        out.push_str("/></D:privilege>");
    }
    out.push_str(&format!("</D:{tag}>"));
}

/// Serialize ACEs into the body of an `ACL` request.
pub fn acl_request_body(aces: &[Ace]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><D:acl xmlns:D=\"DAV:\">",
    );
    for ace in aces {
        out.push_str("<D:ace><D:principal>");
        match &ace.principal {
            AclPrincipal::Href(href) => {
                out.push_str("<D:href>");
                out.push_str(&escape_xml(href));
                out.push_str("</D:href>");
            }
            AclPrincipal::All => out.push_str("<D:all/>"),
            AclPrincipal::Authenticated => out.push_str("<D:authenticated/>"),
            AclPrincipal::Unauthenticated => out.push_str("<D:unauthenticated/>"),
            AclPrincipal::SelfPrincipal => out.push_str("<D:self/>"),
            AclPrincipal::Property(name) => {
                out.push_str("<D:property><D:");
                out.push_str(&escape_xml(name));
                out.push_str("/></D:property>");
            }
        }
        out.push_str("</D:principal>");
        write_privileges(&mut out, "grant", &ace.grant);
        write_privileges(&mut out, "deny", &ace.deny);
        if let Some(inherited) = &ace.inherited {
            out.push_str("<D:inherited><D:href>");
            out.push_str(&escape_xml(inherited));
            out.push_str("</D:href></D:inherited>");
        }
        out.push_str("</D:ace>");
    }
    out.push_str("</D:acl>");
    out
}
