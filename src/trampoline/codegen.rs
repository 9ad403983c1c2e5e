//! Template emission through Cranelift.
//!
//! One template is compiled per signature shape. The function body calls
//! four runtime helpers; every one of them (and the eventual target
//! function) is reached through `iconst` + `call_indirect`, never through a
//! relocation, so the emitted bytes behave identically wherever they are
//! copied. Emission that produces any relocation is rejected.

use cranelift_codegen::control::ControlPlane;
use cranelift_codegen::ir::{types, AbiParam, Function, InstBuilder, Signature as IrSignature, Type, UserFuncName, Value};
use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::Configurable;
use cranelift_codegen::{settings, Context};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use once_cell::sync::Lazy;

use crate::errors::*;
use crate::refcodec;
use crate::signature::{JavaType, MethodSignature};
use crate::trampoline::index::lookup_native_func;

static ISA: Lazy<Option<OwnedTargetIsa>> = Lazy::new(|| {
    let mut flags = settings::builder();
    // Tiny leaf-ish frames; a probestack call would reintroduce a
    // relocation and break copyability.
    flags.set("enable_probestack", "false").ok()?;
    flags.set("opt_level", "speed").ok()?;
    let isa = cranelift_native::builder()
        .map_err(|err| log::error!("no Cranelift backend for this host: {err}"))
        .ok()?
        .finish(settings::Flags::new(flags))
        .map_err(|err| log::error!("Cranelift ISA construction failed: {err}"))
        .ok()?;
    Some(isa)
});

fn isa() -> Result<&'static OwnedTargetIsa> {
    ISA.as_ref().ok_or_else(|| Error::Codegen {
        name: String::new(),
        descriptor: String::new(),
        reason: "no native code generator".into(),
    })
}

fn value_type(ty: JavaType, pointer: Type) -> Option<Type> {
    match ty {
        JavaType::Void => None,
        JavaType::Boolean | JavaType::Byte => Some(types::I8),
        JavaType::Char | JavaType::Short => Some(types::I16),
        JavaType::Int => Some(types::I32),
        JavaType::Long => Some(types::I64),
        JavaType::Float => Some(types::F32),
        JavaType::Double => Some(types::F64),
        JavaType::Object => Some(pointer),
    }
}

/// Compile the template body for one signature shape and return its bytes.
/// The entry point is at offset zero of the returned buffer.
pub(crate) fn emit_template(signature: &MethodSignature) -> Result<Vec<u8>> {
    let isa = isa()?;
    let pointer = isa.pointer_type();
    let call_conv = isa.default_call_conv();
    let key = signature.key();

    let codegen_error = |reason: &str| Error::Codegen {
        name: key.as_str().to_owned(),
        descriptor: String::new(),
        reason: reason.to_owned(),
    };

    if signature.args.is_empty() {
        return Err(codegen_error("signature has no env argument"));
    }

    // The trampoline's own signature doubles as the target's.
    let mut java_sig = IrSignature::new(call_conv);
    for arg in &signature.args {
        let ty = value_type(*arg, pointer).ok_or_else(|| codegen_error("void argument"))?;
        java_sig.params.push(AbiParam::new(ty));
    }
    if let Some(ty) = value_type(signature.ret, pointer) {
        java_sig.returns.push(AbiParam::new(ty));
    }

    let mut codec_sig = IrSignature::new(call_conv);
    codec_sig.params.push(AbiParam::new(pointer));
    codec_sig.returns.push(AbiParam::new(pointer));

    let mut hook_sig = IrSignature::new(call_conv);
    hook_sig.params.push(AbiParam::new(pointer));

    let mut lookup_sig = IrSignature::new(call_conv);
    lookup_sig.returns.push(AbiParam::new(pointer));

    let mut func = Function::with_name_signature(UserFuncName::user(0, 0), java_sig.clone());
    let mut builder_ctx = FunctionBuilderContext::new();
    {
        let mut builder = FunctionBuilder::new(&mut func, &mut builder_ctx);
        let block = builder.create_block();
        builder.append_block_params_for_function_params(block);
        builder.switch_to_block(block);
        builder.seal_block(block);

        let params: Vec<Value> = builder.block_params(block).to_vec();
        let env = params[0];

        let java_sig_ref = builder.import_signature(java_sig.clone());
        let codec_sig_ref = builder.import_signature(codec_sig);
        let hook_sig_ref = builder.import_signature(hook_sig);
        let lookup_sig_ref = builder.import_signature(lookup_sig);

        let wrap_addr = builder
            .ins()
            .iconst(pointer, refcodec::wrap_ref as usize as i64);
        let unwrap_addr = builder
            .ins()
            .iconst(pointer, refcodec::unwrap_ref as usize as i64);
        let enter_addr = builder
            .ins()
            .iconst(pointer, refcodec::enter_user_native_code as usize as i64);
        let leave_addr = builder
            .ins()
            .iconst(pointer, refcodec::leave_user_native_code as usize as i64);
        let lookup_addr = builder
            .ins()
            .iconst(pointer, lookup_native_func as usize as i64);

        builder
            .ins()
            .call_indirect(hook_sig_ref, enter_addr, &[env]);

        // Wrap every reference argument except the env itself.
        let mut call_args = Vec::with_capacity(params.len());
        for (index, (value, ty)) in params.iter().zip(&signature.args).enumerate() {
            if index > 0 && ty.is_reference() {
                let wrapped = builder
                    .ins()
                    .call_indirect(codec_sig_ref, wrap_addr, &[*value]);
                call_args.push(builder.inst_results(wrapped)[0]);
            } else {
                call_args.push(*value);
            }
        }

        let lookup = builder
            .ins()
            .call_indirect(lookup_sig_ref, lookup_addr, &[]);
        let target = builder.inst_results(lookup)[0];

        let call = builder
            .ins()
            .call_indirect(java_sig_ref, target, &call_args);
        let mut results: Vec<Value> = builder.inst_results(call).to_vec();

        if signature.ret.is_reference() {
            let unwrapped = builder
                .ins()
                .call_indirect(codec_sig_ref, unwrap_addr, &[results[0]]);
            results = vec![builder.inst_results(unwrapped)[0]];
        }

        builder
            .ins()
            .call_indirect(hook_sig_ref, leave_addr, &[env]);

        builder.ins().return_(&results);
        builder.finalize();
    }

    let mut context = Context::for_function(func);
    let compiled = context
        .compile(&**isa, &mut ControlPlane::default())
        .map_err(|err| Error::Codegen {
            name: key.as_str().to_owned(),
            descriptor: String::new(),
            reason: err.inner.to_string(),
        })?;

    // Copyability check: any surviving relocation would be resolved
    // relative to this allocation and go stale in the copies.
    if !compiled.buffer.relocs().is_empty() {
        return Err(Error::TemplateNotCopyable {
            key: key.as_str().to_owned(),
        });
    }

    let code = compiled.buffer.data().to_vec();
    if code.is_empty() {
        return Err(codegen_error("empty code buffer"));
    }
    Ok(code)
}

