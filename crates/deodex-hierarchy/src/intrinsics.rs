/// One method the runtime substitutes with a specialized implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intrinsic {
    pub owner: String,
    pub name: String,
    pub signature: String,
}

/// The fixed, process-wide list of inlined methods.
///
/// Built once before the command loop starts and handed to the server
/// explicitly; it is never consulted anywhere else.
#[derive(Clone, Debug, Default)]
pub struct IntrinsicTable {
    entries: Vec<Intrinsic>,
}

impl IntrinsicTable {
    pub fn new(entries: Vec<Intrinsic>) -> Self {
        IntrinsicTable { entries }
    }

    /// The table the Dalvik interpreter inlines, in its fixed order. The
    /// `NativeTestTarget` marker entry comes first; its index is what the
    /// optimized `execute-inline` instructions encode.
    pub fn dalvik() -> Self {
        const ENTRIES: &[(&str, &str, &str)] = &[
            (
                "Lorg/apache/harmony/dalvik/NativeTestTarget;",
                "emptyInlineMethod",
                "()V",
            ),
            ("Ljava/lang/String;", "charAt", "(I)C"),
            ("Ljava/lang/String;", "compareTo", "(Ljava/lang/String;)I"),
            ("Ljava/lang/String;", "equals", "(Ljava/lang/Object;)Z"),
            ("Ljava/lang/String;", "indexOf", "(I)I"),
            ("Ljava/lang/String;", "indexOf", "(II)I"),
            ("Ljava/lang/String;", "length", "()I"),
            ("Ljava/lang/Math;", "abs", "(I)I"),
            ("Ljava/lang/Math;", "abs", "(J)J"),
            ("Ljava/lang/Math;", "abs", "(F)F"),
            ("Ljava/lang/Math;", "abs", "(D)D"),
            ("Ljava/lang/Math;", "min", "(II)I"),
            ("Ljava/lang/Math;", "max", "(II)I"),
            ("Ljava/lang/Math;", "sqrt", "(D)D"),
            ("Ljava/lang/Math;", "cos", "(D)D"),
            ("Ljava/lang/Math;", "sin", "(D)D"),
        ];
        IntrinsicTable {
            entries: ENTRIES
                .iter()
                .map(|(owner, name, signature)| Intrinsic {
                    owner: (*owner).to_owned(),
                    name: (*name).to_owned(),
                    signature: (*signature).to_owned(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[Intrinsic] {
        &self.entries
    }
}
