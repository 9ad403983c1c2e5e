//! Argument-list walking for the variadic JNI call forms.
//!
//! Whatever variant the caller used (`…`, `va_list`, or `jvalue[]`), the
//! wrappers normalize to a packed `jvalue[]` with every reference argument
//! unwrapped, and forward to the host's `…A` form. Extraction from a
//! va_list follows the C variadic promotions: everything integral up to
//! `int` travels as `int`, `long` as `long`, both float widths as
//! `double`, references as pointers.

use jni_sys::{jmethodID, jvalue, JNIEnv};

use crate::interpose::{method_cache, missing_metadata};
use crate::refcodec::unwrap_ref;
use crate::signature::JavaType;
#[cfg(target_arch = "x86_64")]
use crate::signature::MethodSignature;

/// Unwrap a caller-supplied `jvalue[]` into a fresh packed array.
pub(crate) unsafe fn unwrap_packed(
    env: *mut JNIEnv,
    method: jmethodID,
    args: *const jvalue,
) -> Vec<jvalue> {
    let info = method_cache::lookup(env, method);
    let mut packed = Vec::with_capacity(info.signature.args.len());
    let mut next = args;
    for ty in &info.signature.args {
        if next.is_null() {
            missing_metadata("jvalue array shorter than signature");
        }
        let mut value = *next;
        if let JavaType::Object = ty {
            value.l = unwrap_ref(value.l.cast()).cast();
        }
        packed.push(value);
        next = next.add(1);
    }
    packed
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// The System V AMD64 `__va_list_tag`. A C `va_list` argument is a
        /// pointer to one of these.
        #[repr(C)]
        pub(crate) struct VaListTag {
            gp_offset: u32,
            fp_offset: u32,
            overflow_arg_area: *mut u8,
            reg_save_area: *mut u8,
        }

        const GP_AREA_END: u32 = 48; // 6 GPRs
        const FP_AREA_END: u32 = 176; // + 8 XMM slots of 16 bytes

        unsafe fn next_int(ap: &mut VaListTag) -> u64 {
            if ap.gp_offset + 8 <= GP_AREA_END {
                let slot = ap.reg_save_area.add(ap.gp_offset as usize);
                ap.gp_offset += 8;
                slot.cast::<u64>().read_unaligned()
            } else {
                let slot = ap.overflow_arg_area;
                ap.overflow_arg_area = slot.add(8);
                slot.cast::<u64>().read_unaligned()
            }
        }

        unsafe fn next_double(ap: &mut VaListTag) -> f64 {
            if ap.fp_offset + 16 <= FP_AREA_END {
                let slot = ap.reg_save_area.add(ap.fp_offset as usize);
                ap.fp_offset += 16;
                slot.cast::<f64>().read_unaligned()
            } else {
                let slot = ap.overflow_arg_area;
                ap.overflow_arg_area = slot.add(8);
                slot.cast::<f64>().read_unaligned()
            }
        }

        /// Walk a va_list according to `signature`, unwrapping references.
        pub(crate) unsafe fn unwrap_va_args(
            signature: &MethodSignature,
            ap: *mut VaListTag,
        ) -> Vec<jvalue> {
            let ap = &mut *ap;
            let mut packed = Vec::with_capacity(signature.args.len());
            for ty in &signature.args {
                let value = match ty {
                    JavaType::Void => missing_metadata("void in argument position"),
                    JavaType::Boolean => jvalue { z: next_int(ap) as u8 },
                    JavaType::Byte => jvalue { b: next_int(ap) as i8 },
                    JavaType::Char => jvalue { c: next_int(ap) as u16 },
                    JavaType::Short => jvalue { s: next_int(ap) as i16 },
                    JavaType::Int => jvalue { i: next_int(ap) as i32 },
                    JavaType::Long => jvalue { j: next_int(ap) as i64 },
                    JavaType::Float => jvalue { f: next_double(ap) as f32 },
                    JavaType::Double => jvalue { d: next_double(ap) },
                    JavaType::Object => jvalue {
                        l: unwrap_ref(next_int(ap) as usize as *mut std::ffi::c_void).cast(),
                    },
                };
                packed.push(value);
            }
            packed
        }

        /// va_list variant entry: resolve the signature, then walk.
        pub(crate) unsafe fn unwrap_va_list(
            env: *mut JNIEnv,
            method: jmethodID,
            args: jni_sys::va_list,
        ) -> Vec<jvalue> {
            let info = method_cache::lookup(env, method);
            unwrap_va_args(&info.signature, args.cast())
        }
    }
}

#[cfg(all(test, target_arch = "x86_64"))]
mod test {
    use super::*;

    // Build a va_list the way a variadic prologue would, with `consumed`
    // GPRs already burned by named arguments.
    fn fake_va_list(
        gp: &[u64; 6],
        fp: &[f64; 8],
        overflow: &[u64],
        consumed: u32,
    ) -> (VaListTag, Vec<u8>) {
        let mut save = vec![0u8; 176];
        for (i, v) in gp.iter().enumerate() {
            save[i * 8..i * 8 + 8].copy_from_slice(&v.to_ne_bytes());
        }
        for (i, v) in fp.iter().enumerate() {
            save[48 + i * 16..48 + i * 16 + 8].copy_from_slice(&v.to_ne_bytes());
        }
        let tag = VaListTag {
            gp_offset: consumed * 8,
            fp_offset: 48,
            overflow_arg_area: overflow.as_ptr() as *mut u8,
            reg_save_area: save.as_ptr() as *mut u8,
        };
        (tag, save)
    }

    #[test]
    fn walks_mixed_arguments_with_promotions() {
        let signature = MethodSignature::parse("(ZBSIJFD)V", 0).unwrap();
        let gp = [1u64, 0x7f, 0xffff_ffff_ffff_fff6, 42, -7i64 as u64, 0];
        let fp = [1.5f64, 2.25, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let (mut tag, _save) = fake_va_list(&gp, &fp, &[], 0);

        let packed = unsafe { unwrap_va_args(&signature, &mut tag) };
        unsafe {
            assert_eq!(packed[0].z, 1);
            assert_eq!(packed[1].b, 0x7f);
            assert_eq!(packed[2].s, -10);
            assert_eq!(packed[3].i, 42);
            assert_eq!(packed[4].j, -7);
            assert_eq!(packed[5].f, 1.5);
            assert_eq!(packed[6].d, 2.25);
        }
    }

    #[test]
    fn spills_to_overflow_area_after_six_integers() {
        let signature = MethodSignature::parse("(IIIIIIII)V", 0).unwrap();
        let gp = [10, 11, 12, 13, 14, 15];
        let overflow = [16u64, 17];
        let (mut tag, _save) = fake_va_list(&gp, &[0.0; 8], &overflow, 0);

        let packed = unsafe { unwrap_va_args(&signature, &mut tag) };
        let ints: Vec<i32> = packed.iter().map(|v| unsafe { v.i }).collect();
        assert_eq!(ints, [10, 11, 12, 13, 14, 15, 16, 17]);
    }

    #[test]
    fn consumed_named_registers_shift_the_window() {
        let signature = MethodSignature::parse("(II)V", 0).unwrap();
        let gp = [0, 0, 0, 100, 200, 0];
        let (mut tag, _save) = fake_va_list(&gp, &[0.0; 8], &[], 3);

        let packed = unsafe { unwrap_va_args(&signature, &mut tag) };
        unsafe {
            assert_eq!(packed[0].i, 100);
            assert_eq!(packed[1].i, 200);
        }
    }
}
