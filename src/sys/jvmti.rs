//! Hand-maintained JVMTI bindings.
//!
//! The function table mirrors `jvmtiInterface_1_` from `jvmti.h` slot for
//! slot (JVMTI 1.2 layout with the slots later JDKs repurposed, through
//! JDK 21). Only the entries this agent calls are given real types; every
//! other slot is declared as an untyped pointer so the struct keeps the
//! exact size and offsets the VM expects. Do not reorder fields.

#![allow(non_snake_case, non_camel_case_types)]

use std::ffi::c_void;
use std::os::raw::c_char;

use jni_sys::{jclass, jint, jmethodID, jobject, JNIEnv, JNINativeInterface_};

pub type jvmtiError = u32;
pub type jthread = jobject;

pub const JVMTI_ERROR_NONE: jvmtiError = 0;

pub const JVMTI_VERSION_1_2: jint = 0x30010200;

pub const JVMTI_ENABLE: jint = 1;

pub const JVMTI_EVENT_NATIVE_METHOD_BIND: jint = 67;

/// `jvmtiCapabilities`: 128 bits of C bitfields. On the little-endian
/// targets this agent supports, bit N of the C declaration order is bit
/// `N % 32` of word `N / 32`.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug)]
pub struct jvmtiCapabilities {
    pub flags: [u32; 4],
}

const CAN_GENERATE_NATIVE_METHOD_BIND_EVENTS: usize = 30;

impl jvmtiCapabilities {
    pub fn set_can_generate_native_method_bind_events(&mut self) {
        self.set_bit(CAN_GENERATE_NATIVE_METHOD_BIND_EVENTS);
    }

    fn set_bit(&mut self, bit: usize) {
        self.flags[bit / 32] |= 1 << (bit % 32);
    }
}

pub type jvmtiEventNativeMethodBind = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    address: *mut c_void,
    new_address_ptr: *mut *mut c_void,
);

/// `jvmtiEventCallbacks`. Only the callback this agent installs is typed;
/// the struct still spans the full JVMTI 1.2 callback set so
/// `SetEventCallbacks` receives the size the VM expects.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct jvmtiEventCallbacks {
    pub VMInit: *mut c_void,
    pub VMDeath: *mut c_void,
    pub ThreadStart: *mut c_void,
    pub ThreadEnd: *mut c_void,
    pub ClassFileLoadHook: *mut c_void,
    pub ClassLoad: *mut c_void,
    pub ClassPrepare: *mut c_void,
    pub VMStart: *mut c_void,
    pub Exception: *mut c_void,
    pub ExceptionCatch: *mut c_void,
    pub SingleStep: *mut c_void,
    pub FramePop: *mut c_void,
    pub Breakpoint: *mut c_void,
    pub FieldAccess: *mut c_void,
    pub FieldModification: *mut c_void,
    pub MethodEntry: *mut c_void,
    pub MethodExit: *mut c_void,
    pub NativeMethodBind: Option<jvmtiEventNativeMethodBind>,
    pub CompiledMethodLoad: *mut c_void,
    pub CompiledMethodUnload: *mut c_void,
    pub DynamicCodeGenerated: *mut c_void,
    pub DataDumpRequest: *mut c_void,
    pub reserved72: *mut c_void,
    pub MonitorWait: *mut c_void,
    pub MonitorWaited: *mut c_void,
    pub MonitorContendedEnter: *mut c_void,
    pub MonitorContendedEntered: *mut c_void,
    pub reserved77: *mut c_void,
    pub reserved78: *mut c_void,
    pub reserved79: *mut c_void,
    pub ResourceExhausted: *mut c_void,
    pub GarbageCollectionStart: *mut c_void,
    pub GarbageCollectionFinish: *mut c_void,
    pub ObjectFree: *mut c_void,
    pub VMObjectAlloc: *mut c_void,
}

impl jvmtiEventCallbacks {
    pub fn empty() -> jvmtiEventCallbacks {
        // All-null callbacks; Option<fn> has the null niche.
        unsafe { std::mem::zeroed() }
    }
}

pub type SetEventNotificationModeFn = unsafe extern "C" fn(
    env: *mut jvmtiEnv,
    mode: jint,
    event_type: jint,
    event_thread: jthread,
    ...
) -> jvmtiError;

pub type DeallocateFn =
    unsafe extern "system" fn(env: *mut jvmtiEnv, mem: *mut u8) -> jvmtiError;

pub type GetClassSignatureFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    klass: jclass,
    signature_ptr: *mut *mut c_char,
    generic_ptr: *mut *mut c_char,
) -> jvmtiError;

pub type GetMethodNameFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    method: jmethodID,
    name_ptr: *mut *mut c_char,
    signature_ptr: *mut *mut c_char,
    generic_ptr: *mut *mut c_char,
) -> jvmtiError;

pub type GetMethodDeclaringClassFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    method: jmethodID,
    declaring_class_ptr: *mut jclass,
) -> jvmtiError;

pub type SetJNIFunctionTableFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    function_table: *const JNINativeInterface_,
) -> jvmtiError;

pub type GetJNIFunctionTableFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    function_table_ptr: *mut *mut JNINativeInterface_,
) -> jvmtiError;

pub type SetEventCallbacksFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    callbacks: *const jvmtiEventCallbacks,
    size_of_callbacks: jint,
) -> jvmtiError;

pub type AddCapabilitiesFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    capabilities_ptr: *const jvmtiCapabilities,
) -> jvmtiError;

pub type GetPotentialCapabilitiesFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    capabilities_ptr: *mut jvmtiCapabilities,
) -> jvmtiError;

#[repr(C)]
pub struct jvmtiInterface_1_ {
    pub reserved1: *mut c_void,
    pub SetEventNotificationMode: Option<SetEventNotificationModeFn>,
    pub GetAllModules: *mut c_void,
    pub GetAllThreads: *mut c_void,
    pub SuspendThread: *mut c_void,
    pub ResumeThread: *mut c_void,
    pub StopThread: *mut c_void,
    pub InterruptThread: *mut c_void,
    pub GetThreadInfo: *mut c_void,
    pub GetOwnedMonitorInfo: *mut c_void,
    pub GetCurrentContendedMonitor: *mut c_void,
    pub RunAgentThread: *mut c_void,
    pub GetTopThreadGroups: *mut c_void,
    pub GetThreadGroupInfo: *mut c_void,
    pub GetThreadGroupChildren: *mut c_void,
    pub GetFrameCount: *mut c_void,
    pub GetThreadState: *mut c_void,
    pub GetCurrentThread: *mut c_void,
    pub GetFrameLocation: *mut c_void,
    pub NotifyFramePop: *mut c_void,
    pub GetLocalObject: *mut c_void,
    pub GetLocalInt: *mut c_void,
    pub GetLocalLong: *mut c_void,
    pub GetLocalFloat: *mut c_void,
    pub GetLocalDouble: *mut c_void,
    pub SetLocalObject: *mut c_void,
    pub SetLocalInt: *mut c_void,
    pub SetLocalLong: *mut c_void,
    pub SetLocalFloat: *mut c_void,
    pub SetLocalDouble: *mut c_void,
    pub CreateRawMonitor: *mut c_void,
    pub DestroyRawMonitor: *mut c_void,
    pub RawMonitorEnter: *mut c_void,
    pub RawMonitorExit: *mut c_void,
    pub RawMonitorWait: *mut c_void,
    pub RawMonitorNotify: *mut c_void,
    pub RawMonitorNotifyAll: *mut c_void,
    pub SetBreakpoint: *mut c_void,
    pub ClearBreakpoint: *mut c_void,
    pub GetNamedModule: *mut c_void,
    pub SetFieldAccessWatch: *mut c_void,
    pub ClearFieldAccessWatch: *mut c_void,
    pub SetFieldModificationWatch: *mut c_void,
    pub ClearFieldModificationWatch: *mut c_void,
    pub IsModifiableClass: *mut c_void,
    pub Allocate: *mut c_void,
    pub Deallocate: Option<DeallocateFn>,
    pub GetClassSignature: Option<GetClassSignatureFn>,
    pub GetClassStatus: *mut c_void,
    pub GetSourceFileName: *mut c_void,
    pub GetClassModifiers: *mut c_void,
    pub GetClassMethods: *mut c_void,
    pub GetClassFields: *mut c_void,
    pub GetImplementedInterfaces: *mut c_void,
    pub IsInterface: *mut c_void,
    pub IsArrayClass: *mut c_void,
    pub GetClassLoader: *mut c_void,
    pub GetObjectHashCode: *mut c_void,
    pub GetObjectMonitorUsage: *mut c_void,
    pub GetFieldName: *mut c_void,
    pub GetFieldDeclaringClass: *mut c_void,
    pub GetFieldModifiers: *mut c_void,
    pub IsFieldSynthetic: *mut c_void,
    pub GetMethodName: Option<GetMethodNameFn>,
    pub GetMethodDeclaringClass: Option<GetMethodDeclaringClassFn>,
    pub GetMethodModifiers: *mut c_void,
    pub ClearAllFramePops: *mut c_void,
    pub GetMaxLocals: *mut c_void,
    pub GetArgumentsSize: *mut c_void,
    pub GetLineNumberTable: *mut c_void,
    pub GetMethodLocation: *mut c_void,
    pub GetLocalVariableTable: *mut c_void,
    pub SetNativeMethodPrefix: *mut c_void,
    pub SetNativeMethodPrefixes: *mut c_void,
    pub GetBytecodes: *mut c_void,
    pub IsMethodNative: *mut c_void,
    pub IsMethodSynthetic: *mut c_void,
    pub GetLoadedClasses: *mut c_void,
    pub GetClassLoaderClasses: *mut c_void,
    pub PopFrame: *mut c_void,
    pub ForceEarlyReturnObject: *mut c_void,
    pub ForceEarlyReturnInt: *mut c_void,
    pub ForceEarlyReturnLong: *mut c_void,
    pub ForceEarlyReturnFloat: *mut c_void,
    pub ForceEarlyReturnDouble: *mut c_void,
    pub ForceEarlyReturnVoid: *mut c_void,
    pub RedefineClasses: *mut c_void,
    pub GetVersionNumber: *mut c_void,
    pub GetCapabilities: *mut c_void,
    pub GetSourceDebugExtension: *mut c_void,
    pub IsMethodObsolete: *mut c_void,
    pub SuspendThreadList: *mut c_void,
    pub ResumeThreadList: *mut c_void,
    pub AddModuleReads: *mut c_void,
    pub AddModuleExports: *mut c_void,
    pub AddModuleOpens: *mut c_void,
    pub AddModuleUses: *mut c_void,
    pub AddModuleProvides: *mut c_void,
    pub IsModifiableModule: *mut c_void,
    pub GetAllStackTraces: *mut c_void,
    pub GetThreadListStackTraces: *mut c_void,
    pub GetThreadLocalStorage: *mut c_void,
    pub SetThreadLocalStorage: *mut c_void,
    pub GetStackTrace: *mut c_void,
    pub reserved105: *mut c_void,
    pub GetTag: *mut c_void,
    pub SetTag: *mut c_void,
    pub ForceGarbageCollection: *mut c_void,
    pub IterateOverObjectsReachableFromObject: *mut c_void,
    pub IterateOverReachableObjects: *mut c_void,
    pub IterateOverHeap: *mut c_void,
    pub IterateOverInstancesOfClass: *mut c_void,
    pub reserved113: *mut c_void,
    pub GetObjectsWithTags: *mut c_void,
    pub FollowReferences: *mut c_void,
    pub IterateThroughHeap: *mut c_void,
    pub reserved117: *mut c_void,
    pub SuspendAllVirtualThreads: *mut c_void,
    pub ResumeAllVirtualThreads: *mut c_void,
    pub SetJNIFunctionTable: Option<SetJNIFunctionTableFn>,
    pub GetJNIFunctionTable: Option<GetJNIFunctionTableFn>,
    pub SetEventCallbacks: Option<SetEventCallbacksFn>,
    pub GenerateEvents: *mut c_void,
    pub GetExtensionFunctions: *mut c_void,
    pub GetExtensionEvents: *mut c_void,
    pub SetExtensionEventCallback: *mut c_void,
    pub DisposeEnvironment: *mut c_void,
    pub GetErrorName: *mut c_void,
    pub GetJLocationFormat: *mut c_void,
    pub GetSystemProperties: *mut c_void,
    pub GetSystemProperty: *mut c_void,
    pub SetSystemProperty: *mut c_void,
    pub GetPhase: *mut c_void,
    pub GetCurrentThreadCpuTimerInfo: *mut c_void,
    pub GetCurrentThreadCpuTime: *mut c_void,
    pub GetThreadCpuTimerInfo: *mut c_void,
    pub GetThreadCpuTime: *mut c_void,
    pub GetTimerInfo: *mut c_void,
    pub GetTime: *mut c_void,
    pub GetPotentialCapabilities: Option<GetPotentialCapabilitiesFn>,
    pub reserved141: *mut c_void,
    pub AddCapabilities: Option<AddCapabilitiesFn>,
    pub RelinquishCapabilities: *mut c_void,
    pub GetAvailableProcessors: *mut c_void,
    pub GetClassVersionNumbers: *mut c_void,
    pub GetConstantPool: *mut c_void,
    pub GetEnvironmentLocalStorage: *mut c_void,
    pub SetEnvironmentLocalStorage: *mut c_void,
    pub AddToBootstrapClassLoaderSearch: *mut c_void,
    pub SetVerboseFlag: *mut c_void,
    pub AddToSystemClassLoaderSearch: *mut c_void,
    pub RetransformClasses: *mut c_void,
    pub GetOwnedMonitorStackDepthInfo: *mut c_void,
    pub GetObjectSize: *mut c_void,
    pub GetLocalInstance: *mut c_void,
    pub SetHeapSamplingInterval: *mut c_void,
}

/// A JVMTI environment handle, `jvmtiEnv*` in C: a pointer to a pointer to
/// the function table above.
pub type jvmtiEnv = *const jvmtiInterface_1_;
