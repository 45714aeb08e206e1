use crate::domain::identity::Credentials;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  <text>                      add a to-do item (start with // to add text beginning with /)
  /login <email> <password>   sign in (just /login to cancel)
  /logout                     sign out
  /toggle <n>                 mark item n finished or unfinished
  /remove <n>                 remove item n
  /refresh                    reload the list
  /help                       show this message
  /quit                       exit
";

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Login(Credentials),
    Logout,
    Toggle(usize),
    Remove(usize),
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}, type /help for the list of commands")]
    Unknown(String),
    #[error("/{0} needs the number of a row")]
    MissingRow(&'static str),
    #[error("\"{0}\" is not a row number")]
    BadRow(String),
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(Command::Submit(format!("/{escaped}")));
    }
    let Some(command_line) = line.strip_prefix('/') else {
        return Ok(Command::Submit(line.to_owned()));
    };

    let (name, args) = match command_line.trim().split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (command_line.trim(), ""),
    };
    match name {
        "login" => Ok(Command::Login(credentials(args))),
        "logout" => Ok(Command::Logout),
        "toggle" => Ok(Command::Toggle(row("toggle", args)?)),
        "remove" => Ok(Command::Remove(row("remove", args)?)),
        "refresh" => Ok(Command::Refresh),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_owned())),
    }
}

/// `<principal> [secret]`. The secret is everything after the first space.
fn credentials(args: &str) -> Credentials {
    match args.split_once(char::is_whitespace) {
        Some((principal, secret)) => Credentials {
            principal: principal.to_owned(),
            secret: Some(secret.trim().to_owned()).filter(|secret| !secret.is_empty()),
        },
        None => Credentials {
            principal: args.to_owned(),
            secret: None,
        },
    }
}

fn row(command: &'static str, args: &str) -> Result<usize, CommandError> {
    if args.is_empty() {
        return Err(CommandError::MissingRow(command));
    }

    args.parse()
        .map_err(|_| CommandError::BadRow(args.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[test]
    fn plain_text_is_submitted_verbatim() {
        assert_that!(parse("  buy milk "))
            .is_ok()
            .is_equal_to(Command::Submit("  buy milk ".to_owned()));
        assert_that!(parse(""))
            .is_ok()
            .is_equal_to(Command::Submit(String::new()));
    }

    #[test]
    fn double_slash_escapes_text() {
        assert_that!(parse("//etc/hosts"))
            .is_ok()
            .is_equal_to(Command::Submit("/etc/hosts".to_owned()));
    }

    mod login {
        use super::*;

        #[test]
        fn email_and_password() {
            assert_that!(parse("/login me@example.com hunter 2"))
                .is_ok()
                .is_equal_to(Command::Login(Credentials {
                    principal: "me@example.com".to_owned(),
                    secret: Some("hunter 2".to_owned()),
                }));
        }

        #[test]
        fn name_only() {
            assert_that!(parse("/login alice"))
                .is_ok()
                .is_equal_to(Command::Login(Credentials {
                    principal: "alice".to_owned(),
                    secret: None,
                }));
        }

        #[test]
        fn bare_login_is_dismissed() {
            let command = parse("/login").expect("parses");

            let Command::Login(credentials) = command else {
                panic!("Expected a login command, got {command:?}");
            };
            assert!(credentials.is_dismissed());
        }
    }

    #[test]
    fn row_commands_need_numbers() {
        assert_that!(parse("/toggle 3"))
            .is_ok()
            .is_equal_to(Command::Toggle(3));
        assert_that!(parse("/remove  1"))
            .is_ok()
            .is_equal_to(Command::Remove(1));
        assert_that!(parse("/toggle"))
            .is_err()
            .is_equal_to(CommandError::MissingRow("toggle"));
        assert_that!(parse("/remove first"))
            .is_err()
            .is_equal_to(CommandError::BadRow("first".to_owned()));
    }

    #[test]
    fn simple_commands() {
        assert_that!(parse("/logout")).is_ok().is_equal_to(Command::Logout);
        assert_that!(parse("/refresh")).is_ok().is_equal_to(Command::Refresh);
        assert_that!(parse("/help")).is_ok().is_equal_to(Command::Help);
        assert_that!(parse("/quit ")).is_ok().is_equal_to(Command::Quit);
    }

    #[test]
    fn unknown_commands_are_errors() {
        assert_that!(parse("/frobnicate"))
            .is_err()
            .is_equal_to(CommandError::Unknown("frobnicate".to_owned()));
    }
}
