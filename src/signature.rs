use combine::{between, choice, eof, many, satisfy, skip_many1, token, Parser, Stream};

use crate::errors::*;

/// A Java type as seen by the native calling convention.
///
/// Reference types carry no class information here: every object and every
/// array is a pointer-sized opaque handle, so the parser collapses them all
/// to [`JavaType::Object`].
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum JavaType {
    Void,    // V
    Boolean, // Z
    Byte,    // B
    Char,    // C
    Short,   // S
    Int,     // I
    Long,    // J
    Float,   // F
    Double,  // D
    Object,  // L...; or [...
}

impl JavaType {
    /// The single-character descriptor code. Arrays and objects both
    /// report `L`.
    pub fn code(self) -> char {
        match self {
            JavaType::Void => 'V',
            JavaType::Boolean => 'Z',
            JavaType::Byte => 'B',
            JavaType::Char => 'C',
            JavaType::Short => 'S',
            JavaType::Int => 'I',
            JavaType::Long => 'J',
            JavaType::Float => 'F',
            JavaType::Double => 'D',
            JavaType::Object => 'L',
        }
    }

    /// Whether the value is passed as a pointer in the C ABI.
    pub fn is_reference(self) -> bool {
        self == JavaType::Object
    }
}

/// A method type signature: the structural form of a descriptor like
/// `(Ljava/lang/String;I)[B`, flattened to the types the C ABI cares
/// about. Two signatures are equal iff their argument sequences and return
/// types are equal.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MethodSignature {
    pub args: Vec<JavaType>,
    pub ret: JavaType,
}

/// Cache key derived from a [`MethodSignature`]: the return code followed
/// by each argument code. The mapping is injective over the flattened
/// types, so distinct signatures can never collide.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct SignatureKey(String);

impl SignatureKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl MethodSignature {
    /// Parse a JVM method descriptor.
    ///
    /// `extra_ptr_args` object arguments are prepended to the parsed list;
    /// callers use this for the `JNIEnv*` and receiver slots that exist in
    /// the native calling convention but not in the descriptor.
    pub fn parse(descriptor: &str, extra_ptr_args: usize) -> Result<MethodSignature> {
        let ((mut parsed_args, ret), _rest) = method_descriptor()
            .parse(descriptor)
            .map_err(|_| Error::BadDescriptor {
                descriptor: descriptor.to_owned(),
            })?;

        let mut args = vec![JavaType::Object; extra_ptr_args];
        args.append(&mut parsed_args);
        Ok(MethodSignature { args, ret })
    }

    pub fn key(&self) -> SignatureKey {
        let mut key = String::with_capacity(1 + self.args.len());
        key.push(self.ret.code());
        for arg in &self.args {
            key.push(arg.code());
        }
        SignatureKey(key)
    }
}

fn base_type<Input>() -> impl Parser<Input, Output = JavaType>
where
    Input: Stream<Token = char>,
{
    choice((
        token('V').map(|_| JavaType::Void),
        token('Z').map(|_| JavaType::Boolean),
        token('B').map(|_| JavaType::Byte),
        token('C').map(|_| JavaType::Char),
        token('S').map(|_| JavaType::Short),
        token('I').map(|_| JavaType::Int),
        token('J').map(|_| JavaType::Long),
        token('F').map(|_| JavaType::Float),
        token('D').map(|_| JavaType::Double),
        (token('L'), skip_many1(satisfy(|c| c != ';')), token(';')).map(|_| JavaType::Object),
    ))
}

fn field_type<Input>() -> impl Parser<Input, Output = JavaType>
where
    Input: Stream<Token = char>,
{
    // Array depth is irrelevant to the ABI; any `[` prefix makes the whole
    // thing a reference.
    (many::<Vec<_>, _, _>(token('[')), base_type()).map(|(dims, ty)| {
        if dims.is_empty() {
            ty
        } else {
            JavaType::Object
        }
    })
}

fn method_descriptor<Input>() -> impl Parser<Input, Output = (Vec<JavaType>, JavaType)>
where
    Input: Stream<Token = char>,
{
    (
        between(
            token('('),
            token(')'),
            many::<Vec<_>, _, _>(field_type()),
        ),
        field_type(),
        eof(),
    )
        .map(|(args, ret, _)| (args, ret))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_simple_descriptor() {
        let sig = MethodSignature::parse("(IJ)Ljava/lang/String;", 2).unwrap();
        assert_eq!(
            sig.args,
            [
                JavaType::Object,
                JavaType::Object,
                JavaType::Int,
                JavaType::Long
            ]
        );
        assert_eq!(sig.ret, JavaType::Object);
        assert_eq!(sig.key().as_str(), "LLLIJ");
    }

    #[test]
    fn collapses_arrays_to_object() {
        let sig = MethodSignature::parse("([[ILjava/lang/Object;)V", 1).unwrap();
        assert_eq!(
            sig.args,
            [JavaType::Object, JavaType::Object, JavaType::Object]
        );
        assert_eq!(sig.ret, JavaType::Void);
        assert_eq!(sig.key().as_str(), "VLLL");
    }

    #[test]
    fn rejects_unknown_type_code() {
        assert_matches!(
            MethodSignature::parse("(X)V", 0),
            Err(Error::BadDescriptor { .. })
        );
    }

    #[test]
    fn rejects_unterminated_class_name() {
        assert_matches!(
            MethodSignature::parse("()Ljava/lang/List", 0),
            Err(Error::BadDescriptor { .. })
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert_matches!(
            MethodSignature::parse("(I)VV", 0),
            Err(Error::BadDescriptor { .. })
        );
    }

    #[test]
    fn key_is_a_function_of_the_parsed_signature() {
        // Distinct class names, same flattened signature, same key.
        let a = MethodSignature::parse("(Ljava/lang/String;)I", 2).unwrap();
        let b = MethodSignature::parse("([B)I", 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn descriptor_roundtrip_equality() {
        for desc in ["(Ljava/lang/String;I)V", "(IBZ)Ljava/lang/String;", "()V"] {
            let first = MethodSignature::parse(desc, 0).unwrap();
            let second = MethodSignature::parse(desc, 0).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.key(), second.key());
        }
    }
}
