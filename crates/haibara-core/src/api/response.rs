//! The backend's `{"code", "msg", "data"}` response envelope.

use serde::Deserialize;

use super::ApiError;

/// Envelope code for a successful call
pub const CODE_SUCCESS: i32 = 200;
/// Envelope code the backend uses for a missing or rejected login
pub const CODE_NOT_LOGIN: i32 = 401;
/// Envelope code for a missing authority
pub const CODE_NO_PERMISSION: i32 = 403;

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseResult<T> {
    pub code: i32,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ResponseResult<T> {
    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }

    fn message(&self) -> String {
        self.msg.clone().unwrap_or_default()
    }

    fn error(self) -> ApiError {
        match self.code {
            CODE_NOT_LOGIN => ApiError::Unauthorized,
            CODE_NO_PERMISSION => ApiError::AccessDenied(self.message()),
            code => ApiError::Business {
                code,
                msg: self.message(),
            },
        }
    }

    /// Payload of a successful call, or the error the envelope describes.
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.is_success() {
            return Err(self.error());
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse("Successful response without data".to_string()))
    }

    /// For calls whose success carries no payload.
    pub fn into_unit(self) -> Result<(), ApiError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self.error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_data() {
        let r: ResponseResult<Vec<String>> =
            serde_json::from_str(r#"{"code":200,"msg":"success","data":["HTML","EXCEL"]}"#).unwrap();
        assert_eq!(r.into_result().unwrap(), vec!["HTML", "EXCEL"]);
    }

    #[test]
    fn test_success_without_data() {
        let r: ResponseResult<bool> = serde_json::from_str(r#"{"code":200,"msg":"success"}"#).unwrap();
        assert!(matches!(r.clone().into_result(), Err(ApiError::InvalidResponse(_))));
        assert!(r.into_unit().is_ok());
    }

    #[test]
    fn test_failure_codes() {
        let r: ResponseResult<bool> =
            serde_json::from_str(r#"{"code":401,"msg":"请先登录","data":null}"#).unwrap();
        assert!(r.into_result().unwrap_err().is_unauthorized());

        let r: ResponseResult<bool> =
            serde_json::from_str(r#"{"code":403,"msg":"无权限"}"#).unwrap();
        assert!(matches!(r.into_result(), Err(ApiError::AccessDenied(m)) if m == "无权限"));

        let r: ResponseResult<bool> =
            serde_json::from_str(r#"{"code":1004,"msg":"用户名或密码错误"}"#).unwrap();
        assert!(matches!(
            r.into_result(),
            Err(ApiError::Business { code: 1004, ref msg }) if msg == "用户名或密码错误"
        ));
    }
}
