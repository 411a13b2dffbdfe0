use std::io::{self, BufRead, Write};

use tracing::debug;

use deodex_hierarchy::{common_superclass, ClassUniverse, IntrinsicTable, MethodLookup};

use crate::command::{self, Command};

/// Runs the blocking read/dispatch/write loop until the reader reports
/// end-of-stream. Each response is fully written and flushed before the
/// next line is read; handler failures become `err:` lines and never end
/// the loop.
pub fn serve<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    universe: &mut ClassUniverse,
    intrinsics: &IntrinsicTable,
) -> io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let request = line.trim_end_matches(['\r', '\n']);
        debug!(request, "dispatching command");

        let response = match command::parse(request) {
            Ok(command) => dispatch(universe, intrinsics, command),
            Err(message) => Err(message),
        };
        match response {
            Ok(lines) => {
                for l in &lines {
                    writeln!(writer, "{l}")?;
                }
            }
            Err(message) => writeln!(writer, "err: {message}")?,
        }
        writer.flush()?;
    }
}

fn dispatch(
    universe: &mut ClassUniverse,
    intrinsics: &IntrinsicTable,
    command: Command<'_>,
) -> Result<Vec<String>, String> {
    match command {
        Command::Fields(descriptor) => dump_fields(universe, descriptor),
        Command::Intrinsics => dump_intrinsics(universe, intrinsics),
        Command::Vtable(descriptor) => dump_vtable(universe, descriptor),
        Command::Superclass(descriptor) => Ok(lookup_superclass(universe, descriptor)),
        Command::CommonSuperclass { first, second } => {
            merge_classes(universe, first, second)
        }
    }
}

/// `F`: every declared field of the class and of each superclass up to
/// the root, most-derived first.
fn dump_fields(universe: &mut ClassUniverse, descriptor: &str) -> Result<Vec<String>, String> {
    let Some(class) = universe.resolve_class(descriptor) else {
        return Err("error while dumping fields".to_owned());
    };
    let mut lines = Vec::new();
    let mut current = Some(class);
    while let Some(id) = current {
        let record = universe.class(id);
        for field in &record.instance_fields {
            lines.push(format!(
                "field: {} {}:{}",
                field.byte_offset, field.name, field.signature
            ));
        }
        current = record.superclass;
    }
    lines.push("done".to_owned());
    Ok(lines)
}

/// `I`: the whole intrinsic table or nothing; a single unresolvable
/// entry fails the response before any line is produced.
fn dump_intrinsics(
    universe: &mut ClassUniverse,
    intrinsics: &IntrinsicTable,
) -> Result<Vec<String>, String> {
    let mut lines = Vec::with_capacity(intrinsics.entries().len() + 1);
    for entry in intrinsics.entries() {
        let Some(owner) = universe.find_system_class(&entry.owner) else {
            return Err("inline method not found".to_owned());
        };
        let method = universe
            .find_method(owner, &entry.name, &entry.signature, MethodLookup::Direct)
            .or_else(|| {
                universe.find_method(owner, &entry.name, &entry.signature, MethodLookup::Virtual)
            });
        let Some(method) = method else {
            return Err("inline method not found".to_owned());
        };
        lines.push(format!(
            "inline: {} {}->{}{}",
            method.kind.as_str(),
            method.owner,
            method.name,
            method.signature
        ));
    }
    lines.push("done".to_owned());
    Ok(lines)
}

/// `V`: the flattened dispatch table. Interfaces have no table of their
/// own; calls through an interface-typed reference can only be the
/// root's methods, so the root's table is dumped instead.
fn dump_vtable(universe: &mut ClassUniverse, descriptor: &str) -> Result<Vec<String>, String> {
    let Some(mut class) = universe.resolve_class(descriptor) else {
        return Err(format!("could not find class {descriptor}"));
    };
    if universe.class(class).is_interface {
        class = universe.root();
    }
    let mut lines: Vec<String> = universe
        .class(class)
        .vtable
        .iter()
        .map(|m| format!("vtable: {}{}", m.name, m.signature))
        .collect();
    lines.push("done".to_owned());
    Ok(lines)
}

/// `P`: immediate superclass through the plain lookup path. Absence —
/// unknown class, or the root itself — is an empty descriptor, not an
/// error.
fn lookup_superclass(universe: &ClassUniverse, descriptor: &str) -> Vec<String> {
    let superclass = universe
        .find_system_class(descriptor)
        .and_then(|id| universe.class(id).superclass);
    match superclass {
        Some(id) => vec![format!("class: {}", universe.descriptor(id))],
        None => vec!["class: ".to_owned()],
    }
}

/// `C`: resolve both (array-aware), then merge. Arguments are consumed
/// left to right, matching the original's reporting order.
fn merge_classes(
    universe: &mut ClassUniverse,
    first: &str,
    second: Option<&str>,
) -> Result<Vec<String>, String> {
    let c1 = resolve_for_merge(universe, first)?;
    let Some(second) = second else {
        return Err("no classType for common superclass lookup".to_owned());
    };
    let c2 = resolve_for_merge(universe, second)?;
    let merged = common_superclass(universe, c1, c2);
    Ok(vec![format!("class: {}", universe.descriptor(merged))])
}

fn resolve_for_merge(
    universe: &mut ClassUniverse,
    descriptor: &str,
) -> Result<deodex_hierarchy::ClassId, String> {
    universe.resolve_class(descriptor).ok_or_else(|| {
        format!(
            "class {descriptor} could not be found for common superclass lookup. \
             This can be caused if a library the odex depends on is not in the \
             BOOTCLASSPATH environment variable"
        )
    })
}
