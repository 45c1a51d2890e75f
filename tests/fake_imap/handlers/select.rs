//! SELECT / EXAMINE
//!
//! Reports the folder's counts through the untagged `EXISTS` and
//! `RECENT` responses. Folders that are `\Noselect`, broken or unknown
//! get a tagged `NO`.

use super::{Reply, done};
use crate::fake_imap::mailbox::Mailbox;

/// Open `name`; `read_only` distinguishes EXAMINE from SELECT.
pub fn open(tag: &str, name: &str, read_only: bool, mailbox: &Mailbox) -> Reply {
    let Some(folder) = mailbox.get_folder(name) else {
        return vec![done(tag, "NO", "[NONEXISTENT] No such folder")];
    };
    if !folder.can_open() {
        return vec![done(tag, "NO", "[CANNOT] Folder cannot be opened")];
    }

    let (access, command) = if read_only {
        ("READ-ONLY", "EXAMINE")
    } else {
        ("READ-WRITE", "SELECT")
    };
    vec![
        "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n".to_string(),
        format!("* {} EXISTS\r\n", folder.messages),
        format!("* {} RECENT\r\n", folder.recent),
        "* OK [UIDVALIDITY 1]\r\n".to_string(),
        format!("* OK [UIDNEXT {}]\r\n", folder.messages + 1),
        done(tag, "OK", &format!("[{access}] {command} completed")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[test]
    fn examine_reports_counts() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .messages(5)
            .recent(2)
            .build();

        let reply = open("A2", "INBOX", true, &mailbox);

        assert!(reply.contains(&"* 5 EXISTS\r\n".to_string()));
        assert!(reply.contains(&"* 2 RECENT\r\n".to_string()));
        assert_eq!(
            reply.last().unwrap(),
            "A2 OK [READ-ONLY] EXAMINE completed\r\n"
        );
    }

    #[test]
    fn select_is_read_write() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let reply = open("A1", "INBOX", false, &mailbox);
        assert_eq!(
            reply.last().unwrap(),
            "A1 OK [READ-WRITE] SELECT completed\r\n"
        );
    }

    #[test]
    fn unknown_folder_is_refused() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let reply = open("A1", "NoSuchFolder", true, &mailbox);
        assert_eq!(reply, ["A1 NO [NONEXISTENT] No such folder\r\n"]);
    }

    #[test]
    fn noselect_and_broken_are_refused() {
        let mailbox = MailboxBuilder::new()
            .folder("Archive")
            .no_select()
            .folder("Flaky")
            .broken()
            .build();

        assert!(open("A1", "Archive", true, &mailbox)[0].starts_with("A1 NO [CANNOT]"));
        assert!(open("A2", "Flaky", true, &mailbox)[0].starts_with("A2 NO [CANNOT]"));
    }
}
