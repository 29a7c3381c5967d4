//! Companion export surface
//!
//! Names the binary module imports from its companion. The hashed suffixes are
//! emitted by the game's binding generator and are part of the contract; they
//! are never renegotiated at runtime.

/// Import namespace the game module uses for its companion
pub const COMPANION_NAMESPACE: &str = "./snake_game_wasm_bg.js";

/// Default registry id of the companion module
pub const DEFAULT_COMPANION_ID: &str = "../pkg/snake_game_wasm_bg.js";

/// Default entry module id
pub const DEFAULT_ENTRY_MODULE: &str = "../pkg/snake_game_wasm_bg.wasm";

/// Suffix appended to a content hash to form the artifact file name
pub const ARTIFACT_SUFFIX: &str = ".module.wasm";

/// Name of the linear memory export recorded after instantiation
pub const MEMORY_EXPORT: &str = "memory";

pub mod host_exports {
    pub const VECTOR_NEW: &str = "__wbg_vector_new";
    pub const OBJECT_DROP_REF: &str = "__wbindgen_object_drop_ref";
    pub const ALERT: &str = "__wbg_alert_604be308167dab54";
    pub const SELF: &str = "__wbg_self_7eede1f4488bf346";
    pub const CRYPTO: &str = "__wbg_crypto_c909fb428dcbddb6";
    pub const MS_CRYPTO: &str = "__wbg_msCrypto_511eefefbfc70ae4";
    pub const IS_UNDEFINED: &str = "__wbindgen_is_undefined";
    pub const REQUIRE: &str = "__wbg_require_900d5c3984fe7703";
    pub const GET_RANDOM_VALUES_FN: &str = "__wbg_getRandomValues_307049345d0bd88c";
    pub const GET_RANDOM_VALUES: &str = "__wbg_getRandomValues_cd175915511f705e";
    pub const RANDOM_FILL_SYNC: &str = "__wbg_randomFillSync_85b3f4c52c56c313";
    pub const STATIC_ACCESSOR_MODULE: &str = "__wbg_static_accessor_MODULE_ef3aa2eb251158a5";
    pub const ARRAY_NEW: &str = "__wbg_new_b525de17f44a8943";
    pub const ARRAY_PUSH: &str = "__wbg_push_49c286f04dd3bf59";
    pub const BUFFER: &str = "__wbg_buffer_cf65c07de34b9a08";
    pub const UINT8_ARRAY_NEW: &str = "__wbg_new_537b7341ce90bb31";
    pub const UINT8_ARRAY_SET: &str = "__wbg_set_17499e8aa4003ebd";
    pub const UINT8_ARRAY_LENGTH: &str = "__wbg_length_27a2afe8ab42b09f";
    pub const UINT8_ARRAY_NEW_WITH_LENGTH: &str = "__wbg_newwithlength_b56c882b57805732";
    pub const UINT8_ARRAY_SUBARRAY: &str = "__wbg_subarray_7526649b91a252a6";
    pub const THROW: &str = "__wbindgen_throw";
    pub const MEMORY: &str = "__wbindgen_memory";

    /// Every export the companion provides, in declaration order
    pub const ALL: &[&str] = &[
        VECTOR_NEW,
        OBJECT_DROP_REF,
        ALERT,
        SELF,
        CRYPTO,
        MS_CRYPTO,
        IS_UNDEFINED,
        REQUIRE,
        GET_RANDOM_VALUES_FN,
        GET_RANDOM_VALUES,
        RANDOM_FILL_SYNC,
        STATIC_ACCESSOR_MODULE,
        ARRAY_NEW,
        ARRAY_PUSH,
        BUFFER,
        UINT8_ARRAY_NEW,
        UINT8_ARRAY_SET,
        UINT8_ARRAY_LENGTH,
        UINT8_ARRAY_NEW_WITH_LENGTH,
        UINT8_ARRAY_SUBARRAY,
        THROW,
        MEMORY,
    ];
}
