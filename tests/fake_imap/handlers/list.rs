//! LIST
//!
//! One `* LIST` line per folder with RFC 3348 child attributes and
//! RFC 6154 special-use attributes:
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "INBOX"
//! * LIST (\Noselect \HasChildren) "/" "Archive"
//! * LIST (\HasNoChildren \Trash) "/" "Bin"
//! A0002 OK LIST completed
//! ```
//!
//! The reference and pattern are ignored; the client always asks for
//! the whole hierarchy.

use super::{Reply, done};
use crate::fake_imap::mailbox::{DELIMITER, Folder, Mailbox};

pub fn list(tag: &str, mailbox: &Mailbox) -> Reply {
    let mut reply: Reply = mailbox
        .folders
        .iter()
        .map(|folder| list_line(folder, mailbox.has_children(&folder.name)))
        .collect();
    reply.push(done(tag, "OK", "LIST completed"));
    reply
}

fn list_line(folder: &Folder, has_children: bool) -> String {
    let mut attributes = Vec::new();
    if folder.no_select {
        attributes.push("\\Noselect");
    }
    attributes.push(if has_children {
        "\\HasChildren"
    } else {
        "\\HasNoChildren"
    });
    if let Some(special) = &folder.special_use {
        attributes.push(special);
    }
    format!(
        "* LIST ({}) \"{DELIMITER}\" \"{}\"\r\n",
        attributes.join(" "),
        folder.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[test]
    fn one_line_per_folder_then_ok() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .folder("Sent")
            .folder("Trash")
            .build();

        let reply = list("A1", &mailbox);

        assert_eq!(reply.len(), 4);
        assert!(reply[1].ends_with("\"Sent\"\r\n"));
        assert_eq!(reply[3], "A1 OK LIST completed\r\n");
    }

    #[test]
    fn empty_mailbox_only_completes() {
        let reply = list("T2", &MailboxBuilder::new().build());
        assert_eq!(reply, ["T2 OK LIST completed\r\n"]);
    }

    #[test]
    fn marks_parents_and_noselect() {
        let mailbox = MailboxBuilder::new()
            .folder("Archive")
            .no_select()
            .folder("Archive/2024")
            .build();

        let reply = list("T3", &mailbox);

        assert_eq!(reply[0], "* LIST (\\Noselect \\HasChildren) \"/\" \"Archive\"\r\n");
        assert_eq!(reply[1], "* LIST (\\HasNoChildren) \"/\" \"Archive/2024\"\r\n");
    }

    #[test]
    fn includes_special_use() {
        let mailbox = MailboxBuilder::new()
            .folder("Bin")
            .special_use("\\Trash")
            .build();

        assert!(list("T4", &mailbox)[0].contains("(\\HasNoChildren \\Trash)"));
    }
}
