//! Group chat membership and permissions.
//!
//! Messages live in one flat collection; group scoping happens when reading.
//! Deleting a message only flags it, the record is kept.

use crate::model::{Account, ChatGroup, ChatMessage, MessageType, Role};
use crate::store;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("chat group not found: {0}")]
    GroupNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
    #[error("not a member of this group")]
    NotVisible,
    #[error("sending is disabled for this account in this group")]
    SendDisabled,
    #[error("only group admins can delete messages")]
    NotModerator,
    #[error("message content must not be empty")]
    EmptyContent,
    #[error("{0} messages need a fileUrl")]
    MissingFileUrl(&'static str),
    #[error("group admins must also be members: {0}")]
    AdminNotMember(String),
    #[error("group name must not be empty")]
    EmptyName,
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::GroupNotFound(_) | ChatError::MessageNotFound(_) => "not_found",
            ChatError::NotVisible | ChatError::SendDisabled | ChatError::NotModerator => {
                "forbidden"
            }
            ChatError::EmptyContent
            | ChatError::MissingFileUrl(_)
            | ChatError::AdminNotMember(_)
            | ChatError::EmptyName => "bad_params",
        }
    }
}

/// Staff can always send; students only where the group allows it.
pub fn can_send(user: &Account, group: &ChatGroup) -> bool {
    match user.role {
        Role::Admin | Role::Teacher | Role::Assistant => true,
        Role::Student => group.students_can_send,
    }
}

pub fn can_moderate(user: &Account, group: &ChatGroup) -> bool {
    group.admin_ids.iter().any(|id| *id == user.id)
}

pub fn can_see(user: &Account, group: &ChatGroup) -> bool {
    user.role == Role::Admin || group.members.iter().any(|id| *id == user.id)
}

pub fn visible_groups<'a>(user: &Account, groups: &'a [ChatGroup]) -> Vec<&'a ChatGroup> {
    groups.iter().filter(|g| can_see(user, g)).collect()
}

pub fn visible_messages<'a>(group_id: &str, messages: &'a [ChatMessage]) -> Vec<&'a ChatMessage> {
    messages
        .iter()
        .filter(|m| m.group_id == group_id && !m.is_deleted())
        .collect()
}

pub struct Outgoing<'a> {
    pub content: &'a str,
    pub kind: MessageType,
    pub file_url: Option<&'a str>,
}

/// Appends a message from `sender` after checking visibility and send rights.
pub fn send(
    messages: &mut Vec<ChatMessage>,
    sender: &Account,
    group: &ChatGroup,
    out: Outgoing<'_>,
) -> Result<ChatMessage, ChatError> {
    if !can_see(sender, group) {
        return Err(ChatError::NotVisible);
    }
    if !can_send(sender, group) {
        return Err(ChatError::SendDisabled);
    }
    let content = out.content.trim();
    let file_url = out.file_url.map(str::trim).filter(|u| !u.is_empty());
    match out.kind {
        MessageType::Text if content.is_empty() => return Err(ChatError::EmptyContent),
        MessageType::Image if file_url.is_none() => return Err(ChatError::MissingFileUrl("image")),
        MessageType::Video if file_url.is_none() => return Err(ChatError::MissingFileUrl("video")),
        MessageType::File if file_url.is_none() => return Err(ChatError::MissingFileUrl("file")),
        _ => {}
    }

    let msg = ChatMessage {
        id: store::generate_id(),
        group_id: group.id.clone(),
        sender_id: sender.id.clone(),
        sender_name: sender.name.clone(),
        sender_role: sender.role,
        content: content.to_string(),
        kind: out.kind,
        file_url: file_url.map(str::to_string),
        created_at: store::now_iso(),
        deleted: None,
    };
    messages.push(msg.clone());
    Ok(msg)
}

pub fn soft_delete(
    messages: &mut [ChatMessage],
    groups: &[ChatGroup],
    actor: &Account,
    message_id: &str,
) -> Result<(), ChatError> {
    let Some(msg) = messages.iter_mut().find(|m| m.id == message_id) else {
        return Err(ChatError::MessageNotFound(message_id.to_string()));
    };
    let Some(group) = groups.iter().find(|g| g.id == msg.group_id) else {
        return Err(ChatError::GroupNotFound(msg.group_id.clone()));
    };
    if !can_moderate(actor, group) {
        return Err(ChatError::NotModerator);
    }
    msg.deleted = Some(true);
    tracing::info!(message_id, group_id = %group.id, actor_id = %actor.id, "chat message deleted");
    Ok(())
}

/// Checks a group before it is written.
pub fn validate_group(group: &ChatGroup) -> Result<(), ChatError> {
    if group.name.trim().is_empty() {
        return Err(ChatError::EmptyName);
    }
    if let Some(stray) = group.admin_ids.iter().find(|a| !group.members.contains(a)) {
        return Err(ChatError::AdminNotMember(stray.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn accounts() -> Vec<Account> {
        seed::default_accounts()
    }

    fn by_username(name: &str) -> Account {
        accounts()
            .into_iter()
            .find(|a| a.username == name)
            .expect("seeded account")
    }

    fn group(id: &str) -> ChatGroup {
        seed::default_chat_groups()
            .into_iter()
            .find(|g| g.id == id)
            .expect("seeded group")
    }

    fn text(content: &str) -> Outgoing<'_> {
        Outgoing {
            content,
            kind: MessageType::Text,
            file_url: None,
        }
    }

    #[test]
    fn students_blocked_when_group_disallows_sending() {
        let mut g = group("cg2");
        g.members = accounts().iter().map(|a| a.id.clone()).collect();
        assert!(!g.students_can_send);
        for acc in accounts() {
            let expected = acc.role != Role::Student;
            assert_eq!(can_send(&acc, &g), expected, "{}", acc.username);
        }
    }

    #[test]
    fn students_allowed_when_group_allows_sending() {
        let g = group("cg1");
        assert!(can_send(&by_username("0012345678"), &g));
    }

    #[test]
    fn admin_sees_every_group_others_only_their_own() {
        let groups = seed::default_chat_groups();
        assert_eq!(visible_groups(&by_username("admin"), &groups).len(), 2);
        let student_groups = visible_groups(&by_username("0012345678"), &groups);
        assert_eq!(student_groups.len(), 1);
        assert_eq!(student_groups[0].id, "cg1");
        assert_eq!(visible_groups(&by_username("assistant8"), &groups)[0].id, "cg2");
    }

    #[test]
    fn send_trims_and_snapshots_sender() {
        let mut messages = seed::default_chat_messages();
        let teacher = by_username("teacher1");
        let msg = send(&mut messages, &teacher, &group("cg1"), text("  hello  ")).expect("send");
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.sender_name, teacher.name);
        assert_eq!(msg.sender_role, Role::Teacher);
        assert_eq!(messages.len(), 3);

        assert_eq!(
            send(&mut messages, &teacher, &group("cg1"), text("   ")),
            Err(ChatError::EmptyContent)
        );
        let file = Outgoing {
            content: "",
            kind: MessageType::File,
            file_url: None,
        };
        assert_eq!(
            send(&mut messages, &teacher, &group("cg1"), file),
            Err(ChatError::MissingFileUrl("file"))
        );
    }

    #[test]
    fn non_member_cannot_send() {
        let mut messages = Vec::new();
        let student = by_username("0012345678");
        assert_eq!(
            send(&mut messages, &student, &group("cg2"), text("hi")),
            Err(ChatError::NotVisible)
        );
        assert!(messages.is_empty());
    }

    #[test]
    fn soft_delete_hides_but_keeps_message() {
        let groups = seed::default_chat_groups();
        let mut messages = seed::default_chat_messages();

        let student = by_username("0012345678");
        assert_eq!(
            soft_delete(&mut messages, &groups, &student, "cm1"),
            Err(ChatError::NotModerator)
        );

        let assistant = by_username("assistant7");
        soft_delete(&mut messages, &groups, &assistant, "cm2").expect("delete");
        let visible: Vec<_> = visible_messages("cg1", &messages).iter().map(|m| m.id.clone()).collect();
        assert_eq!(visible, vec!["cm1".to_string()]);
        let stored = messages.iter().find(|m| m.id == "cm2").expect("still stored");
        assert_eq!(stored.deleted, Some(true));

        assert_eq!(
            soft_delete(&mut messages, &groups, &assistant, "nope"),
            Err(ChatError::MessageNotFound("nope".into()))
        );
    }

    #[test]
    fn group_admins_must_be_members() {
        let mut g = group("cg1");
        assert!(validate_group(&g).is_ok());
        g.admin_ids.push("99".into());
        assert_eq!(validate_group(&g), Err(ChatError::AdminNotMember("99".into())));
        g.admin_ids.pop();
        g.name = " ".into();
        assert_eq!(validate_group(&g), Err(ChatError::EmptyName));
    }
}
