/// One tokenized request line.
///
/// `C` keeps its second argument optional: the original consumes the
/// arguments left to right, so an unresolvable first class is reported
/// before a missing second one is even noticed. That ordering is part of
/// the observable protocol and lives in the handler, not here.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Fields(&'a str),
    Intrinsics,
    Vtable(&'a str),
    Superclass(&'a str),
    CommonSuperclass {
        first: &'a str,
        second: Option<&'a str>,
    },
}

/// Splits on single spaces, dropping empty tokens (consecutive spaces
/// collapse, as with `strtok`).
pub(crate) fn parse(line: &str) -> Result<Command<'_>, String> {
    let mut tokens = line.split(' ').filter(|t| !t.is_empty());
    let Some(command) = tokens.next() else {
        return Err("error interpreting command".to_owned());
    };
    match command {
        "F" => match tokens.next() {
            Some(descriptor) => Ok(Command::Fields(descriptor)),
            None => Err("no classType for field lookup".to_owned()),
        },
        "I" => Ok(Command::Intrinsics),
        "V" => match tokens.next() {
            Some(descriptor) => Ok(Command::Vtable(descriptor)),
            None => Err("no classType for vtable dump".to_owned()),
        },
        "P" => match tokens.next() {
            Some(descriptor) => Ok(Command::Superclass(descriptor)),
            None => Err("no classType for superclass lookup".to_owned()),
        },
        "C" => match tokens.next() {
            Some(first) => Ok(Command::CommonSuperclass {
                first,
                second: tokens.next(),
            }),
            None => Err("no classType for common superclass lookup".to_owned()),
        },
        _ => Err("not a valid command".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_and_selects_handlers() {
        assert_eq!(parse("F Lfoo;"), Ok(Command::Fields("Lfoo;")));
        assert_eq!(parse("I"), Ok(Command::Intrinsics));
        assert_eq!(
            parse("C La; Lb;"),
            Ok(Command::CommonSuperclass {
                first: "La;",
                second: Some("Lb;"),
            })
        );
    }

    #[test]
    fn consecutive_spaces_collapse() {
        assert_eq!(parse("V   [Lfoo;"), Ok(Command::Vtable("[Lfoo;")));
    }

    #[test]
    fn missing_arguments_name_their_purpose() {
        assert_eq!(parse("F"), Err("no classType for field lookup".to_owned()));
        assert_eq!(parse("V"), Err("no classType for vtable dump".to_owned()));
        assert_eq!(parse("P"), Err("no classType for superclass lookup".to_owned()));
        assert_eq!(
            parse("C"),
            Err("no classType for common superclass lookup".to_owned())
        );
    }

    #[test]
    fn empty_and_unknown_lines_are_rejected() {
        assert_eq!(parse(""), Err("error interpreting command".to_owned()));
        assert_eq!(parse("   "), Err("error interpreting command".to_owned()));
        assert_eq!(parse("Q"), Err("not a valid command".to_owned()));
        assert_eq!(parse("FIELDS Lfoo;"), Err("not a valid command".to_owned()));
    }
}
